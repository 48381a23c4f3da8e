/// auto-pay sweep - a background scheduler paying bills on a controlled clock
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use recurring_bills::{
    AutoPayScheduler, BillDraft, BillService, CancellationToken, EngineConfig, InMemoryBillRepository,
    Money, RecurrenceRule, SafeTimeProvider, TimeSource, TracingNotifier,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();

    let config = EngineConfig {
        sweep_interval_secs: 1,
        ..EngineConfig::default()
    };
    let service = Arc::new(BillService::new(
        Arc::new(InMemoryBillRepository::new()),
        time.clone(),
        Arc::new(TracingNotifier),
        config,
    )?);

    // streaming service, paid three days early
    let streaming = service.create_bill(
        BillDraft::new(
            "Streaming",
            Money::from_minor(1_599),
            NaiveDate::from_ymd_opt(2024, 1, 5).ok_or("bad date")?,
            RecurrenceRule::monthly_on(5),
        )
        .auto_pay(3),
    )?;
    println!("trigger at {:?}", streaming.auto_pay_trigger_at);

    let cancel = CancellationToken::new();
    let task = Arc::new(AutoPayScheduler::new(service.clone())).spawn(cancel.clone());

    // jump to the trigger and let the next tick pick it up
    controller.advance(Duration::days(1) + Duration::hours(1));
    tokio::time::sleep(StdDuration::from_millis(1_500)).await;

    cancel.cancel();
    task.await?;

    let bill = service.get_bill(streaming.id)?;
    println!("payments: {}", bill.payment_history.len());
    println!("next due: {}", bill.next_occurrence_at);
    for event in service.take_events() {
        println!("{:?}", event);
    }

    Ok(())
}
