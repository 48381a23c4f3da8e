/// quick start - create a bill, pay it, see where it rolls to
use std::sync::Arc;

use chrono::NaiveDate;
use recurring_bills::{
    BillDraft, BillFilter, BillService, EngineConfig, InMemoryBillRepository, Money, RecurrenceRule,
    SystemClock, TracingNotifier,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let service = BillService::new(
        Arc::new(InMemoryBillRepository::new()),
        Arc::new(SystemClock),
        Arc::new(TracingNotifier),
        EngineConfig::default(),
    )?;

    // rent on the 1st of every month
    let rent = service.create_bill(BillDraft::new(
        "Rent",
        Money::from_major(1_200),
        NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("bad date")?,
        RecurrenceRule::monthly_on(1),
    ))?;
    println!("rent is next due {}", rent.next_occurrence_at);

    // pay the occurrence we were shown
    let payment = service.mark_paid(rent.id, rent.next_occurrence_at)?;
    println!("paid {} for {}", payment.amount, payment.occurrence_due_at);

    // a second tap on the same occurrence is rejected
    if let Err(e) = service.mark_paid(rent.id, rent.next_occurrence_at) {
        println!("second payment refused: {}", e);
    }

    for view in service.views(BillFilter::All)? {
        println!("{}", view.to_json_pretty()?);
    }

    Ok(())
}
