//! read-only views over bills for display and export

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::bill::Bill;
use crate::decimal::Money;
use crate::ledger;
use crate::types::{BillFilter, BillId, DueStatus, Frequency};

/// serializable view of a bill's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillView {
    pub id: BillId,
    pub title: String,
    pub amount: Money,
    pub timezone: Tz,
    pub schedule: ScheduleView,
    pub payments: PaymentSummaryView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleView {
    pub frequency: Frequency,
    pub interval: u32,
    pub next_occurrence_at: DateTime<Utc>,
    pub due_status: DueStatus,
    /// calendar days in the bill's timezone; negative once overdue
    pub days_until_due: i64,
    pub auto_pay: Option<AutoPayView>,
    pub remind_offsets: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPayView {
    pub lead_days: u32,
    pub trigger_at: Option<DateTime<Utc>>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSummaryView {
    pub is_paid_for_next: bool,
    pub payment_count: usize,
    pub total_paid: Money,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub last_occurrence_paid_for: Option<DateTime<Utc>>,
}

impl BillView {
    pub fn from_bill(bill: &Bill, now: DateTime<Utc>) -> Self {
        BillView {
            id: bill.id,
            title: bill.title.clone(),
            amount: bill.amount,
            timezone: bill.timezone,
            schedule: ScheduleView {
                frequency: bill.recurrence.frequency,
                interval: bill.recurrence.interval,
                next_occurrence_at: bill.next_occurrence_at,
                due_status: due_status(bill, now),
                days_until_due: days_until_due(bill, now),
                auto_pay: bill.auto_pay.then(|| AutoPayView {
                    lead_days: bill.auto_pay_lead_days,
                    trigger_at: bill.auto_pay_trigger_at,
                    description: describe_lead(bill.auto_pay_lead_days),
                }),
                remind_offsets: bill.remind_offsets.clone(),
            },
            payments: PaymentSummaryView {
                is_paid_for_next: ledger::is_satisfied(bill),
                payment_count: bill.payment_history.len(),
                total_paid: bill.total_paid(),
                last_paid_at: bill.last_paid_at,
                last_occurrence_paid_for: bill.last_occurrence_paid_for,
            },
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn describe_lead(lead_days: u32) -> String {
    match lead_days {
        0 => "on the due date".to_string(),
        1 => "1 day before".to_string(),
        n => format!("{} days before", n),
    }
}

fn local_date(bill: &Bill, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&bill.timezone).date_naive()
}

/// overdue once the due instant has passed, otherwise by local calendar day
pub fn due_status(bill: &Bill, now: DateTime<Utc>) -> DueStatus {
    if bill.next_occurrence_at <= now {
        DueStatus::Overdue
    } else if local_date(bill, bill.next_occurrence_at) == local_date(bill, now) {
        DueStatus::DueToday
    } else {
        DueStatus::Upcoming
    }
}

pub fn days_until_due(bill: &Bill, now: DateTime<Utc>) -> i64 {
    (local_date(bill, bill.next_occurrence_at) - local_date(bill, now)).num_days()
}

pub fn matches_filter(bill: &Bill, filter: BillFilter) -> bool {
    match filter {
        BillFilter::All => true,
        BillFilter::AutoPay => bill.auto_pay,
        BillFilter::Paid => ledger::paid_for_last_occurrence(bill),
        BillFilter::Unpaid => !ledger::is_satisfied(bill),
    }
}

pub fn filter_bills(bills: &[Bill], filter: BillFilter) -> Vec<&Bill> {
    bills.iter().filter(|bill| matches_filter(bill, filter)).collect()
}

/// bills split by due status, each group soonest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DueGroups {
    pub overdue: Vec<BillView>,
    pub due_today: Vec<BillView>,
    pub upcoming: Vec<BillView>,
}

impl DueGroups {
    pub fn len(&self) -> usize {
        self.overdue.len() + self.due_today.len() + self.upcoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn group_by_due(bills: &[Bill], now: DateTime<Utc>) -> DueGroups {
    let mut sorted: Vec<&Bill> = bills.iter().collect();
    sorted.sort_by_key(|bill| bill.next_occurrence_at);

    let mut groups = DueGroups::default();
    for bill in sorted {
        let view = BillView::from_bill(bill, now);
        match view.schedule.due_status {
            DueStatus::Overdue => groups.overdue.push(view),
            DueStatus::DueToday => groups.due_today.push(view),
            DueStatus::Upcoming => groups.upcoming.push(view),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::BillDraft;
    use crate::config::EngineConfig;
    use crate::recurrence::RecurrenceRule;
    use crate::types::PaymentMethod;
    use chrono::TimeZone;

    fn bill(title: &str, day: u32, now: DateTime<Utc>) -> Bill {
        let draft = BillDraft::new(
            title,
            Money::from_major(50),
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            RecurrenceRule::monthly_on(day),
        );
        Bill::create(draft, &EngineConfig::default(), now).unwrap()
    }

    #[test]
    fn test_due_status_and_days() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let water = bill("Water", 10, created);

        let before = Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap();
        assert_eq!(due_status(&water, before), DueStatus::Upcoming);
        assert_eq!(days_until_due(&water, before), 3);

        let morning = Utc.with_ymd_and_hms(2024, 5, 10, 6, 0, 0).unwrap();
        assert_eq!(due_status(&water, morning), DueStatus::DueToday);
        assert_eq!(days_until_due(&water, morning), 0);

        let later = Utc.with_ymd_and_hms(2024, 5, 12, 6, 0, 0).unwrap();
        assert_eq!(due_status(&water, later), DueStatus::Overdue);
        assert_eq!(days_until_due(&water, later), -2);
    }

    #[test]
    fn test_due_today_uses_bill_timezone() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let draft = BillDraft::new(
            "Gym",
            Money::from_major(30),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            RecurrenceRule::monthly_on(10),
        )
        .in_timezone(chrono_tz::America::Los_Angeles);
        let gym = Bill::create(draft, &EngineConfig::default(), created).unwrap();

        // may 10 02:00 utc is still may 9 in los angeles
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 2, 0, 0).unwrap();
        assert_eq!(due_status(&gym, now), DueStatus::Upcoming);
        assert_eq!(days_until_due(&gym, now), 1);
    }

    #[test]
    fn test_filters() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut paid = bill("Power", 5, created);
        ledger::record_payment(&mut paid, PaymentMethod::Manual, created).unwrap();
        let mut auto = bill("Internet", 15, created);
        auto.auto_pay = true;
        let bills = vec![paid, auto, bill("Water", 20, created)];

        let titles = |filter| {
            filter_bills(&bills, filter)
                .into_iter()
                .map(|b| b.title.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(titles(BillFilter::All).len(), 3);
        assert_eq!(titles(BillFilter::AutoPay), vec!["Internet"]);
        assert_eq!(titles(BillFilter::Paid), vec!["Power"]);
        // power rolled to june 5, which is unpaid again
        assert_eq!(titles(BillFilter::Unpaid).len(), 3);
    }

    #[test]
    fn test_group_by_due_sorted() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let bills = vec![
            bill("Water", 20, created),
            bill("Rent", 2, created),
            bill("Power", 9, created),
            bill("Phone", 10, created),
            bill("Gym", 3, created),
        ];

        let now = Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap();
        let groups = group_by_due(&bills, now);

        let titles = |views: &[BillView]| views.iter().map(|v| v.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&groups.overdue), vec!["Rent", "Gym", "Power"]);
        assert_eq!(titles(&groups.due_today), vec!["Phone"]);
        assert_eq!(titles(&groups.upcoming), vec!["Water"]);
        assert_eq!(groups.len(), 5);
    }

    #[test]
    fn test_view_json() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut internet = bill("Internet", 15, created);
        internet.auto_pay = true;
        internet.auto_pay_lead_days = 2;

        let view = BillView::from_bill(&internet, created);
        let auto = view.schedule.auto_pay.as_ref().unwrap();
        assert_eq!(auto.description, "2 days before");
        assert!(!view.payments.is_paid_for_next);

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"Internet\""));
        assert!(json.contains("\"Upcoming\""));
    }
}
