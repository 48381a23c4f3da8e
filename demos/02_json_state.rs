/// json state - export bills, reload them, group by due status
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use recurring_bills::{
    Bill, BillDraft, BillFilter, BillService, EngineConfig, InMemoryBillRepository, Money, NoopNotifier,
    RecurrenceRule, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== json state ===\n");

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let repository = Arc::new(InMemoryBillRepository::new());
    let service = BillService::new(repository.clone(), time.clone(), Arc::new(NoopNotifier), EngineConfig::default())?;

    service.create_bill(
        BillDraft::new(
            "Insurance",
            Money::from_major(640),
            NaiveDate::from_ymd_opt(2024, 2, 29).ok_or("bad date")?,
            RecurrenceRule::yearly(),
        )
        .in_timezone(chrono_tz::Europe::London),
    )?;
    service.create_bill(
        BillDraft::new(
            "Payroll card",
            Money::from_major(35),
            NaiveDate::from_ymd_opt(2024, 1, 31).ok_or("bad date")?,
            RecurrenceRule::monthly_last_day().skipping_weekends(),
        )
        .at(NaiveTime::from_hms_opt(7, 30, 0).ok_or("bad time")?)
        .in_timezone(chrono_tz::America::New_York),
    )?;

    // stage 1: export
    let bills = service.list_bills(BillFilter::All)?;
    let json = serde_json::to_string_pretty(&bills)?;
    println!("stage 1: exported");
    println!("-----------------");
    println!("{}\n", json);

    // stage 2: reload into a fresh repository
    let restored: Vec<Bill> = serde_json::from_str(&json)?;
    let reloaded = BillService::new(
        Arc::new(InMemoryBillRepository::with_bills(restored)),
        time.clone(),
        Arc::new(NoopNotifier),
        EngineConfig::default(),
    )?;
    println!("stage 2: reloaded {} bills\n", reloaded.list_bills(BillFilter::All)?.len());

    // stage 3: a month later, grouped by due status
    controller.advance(Duration::days(30));
    let groups = reloaded.due_groups(BillFilter::All)?;
    println!("stage 3: grouped");
    println!("----------------");
    println!("{}", serde_json::to_string_pretty(&groups)?);

    Ok(())
}
