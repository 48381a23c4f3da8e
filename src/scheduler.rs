//! periodic auto-pay sweep
//!
//! each sweep reads every bill, pays the auto-pay bills whose trigger has
//! passed and sends reminder and overdue notices for the rest. a failure on
//! one bill is recorded and the sweep moves on.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bill::Bill;
use crate::errors::{BillError, Result};
use crate::events::BillEvent;
use crate::ledger::{self, Payment};
use crate::service::BillService;
use crate::types::{BillId, PaymentMethod};

/// a notice owed to the user for a bill's next occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Reminder { days_before: u32 },
    Overdue,
}

impl Notice {
    pub fn message(&self, bill: &Bill) -> String {
        match self {
            Notice::Reminder { days_before: 0 } => format!("{} is due today ({})", bill.title, bill.amount),
            Notice::Reminder { days_before: 1 } => format!("{} is due tomorrow ({})", bill.title, bill.amount),
            Notice::Reminder { days_before } => {
                format!("{} is due in {} days ({})", bill.title, days_before, bill.amount)
            }
            Notice::Overdue => format!("{} is overdue ({})", bill.title, bill.amount),
        }
    }
}

/// notices that fall inside the sweep window ending at `now`
///
/// a reminder for offset `n` fires on the sweep where `now` is in
/// `[due - n days, due - n days + window)`; the overdue notice fires once
/// `now` is in `(due, due + window]`. paid and auto-pay bills get none.
pub fn due_notices(bill: &Bill, now: DateTime<Utc>, window: Duration) -> Vec<Notice> {
    if bill.auto_pay || ledger::is_satisfied(bill) {
        return Vec::new();
    }

    let due = bill.next_occurrence_at;
    let mut notices: Vec<Notice> = bill
        .remind_offsets
        .iter()
        .filter(|offset| {
            let at = due - Duration::days(i64::from(**offset));
            at <= now && now < at + window
        })
        .map(|offset| Notice::Reminder { days_before: *offset })
        .collect();
    notices.dedup();

    if due < now && now <= due + window {
        notices.push(Notice::Overdue);
    }
    notices
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepFailure {
    pub bill_id: BillId,
    pub error: BillError,
}

/// outcome of a single sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub evaluated: usize,
    pub payments: Vec<Payment>,
    /// paid by someone else between the listing and the payment
    pub already_paid: usize,
    /// edited, deleted or taken off auto-pay between the listing and the payment
    pub stale: usize,
    pub notices_sent: usize,
    pub failures: Vec<SweepFailure>,
    pub cancelled: bool,
}

impl SweepReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            evaluated: 0,
            payments: Vec::new(),
            already_paid: 0,
            stale: 0,
            notices_sent: 0,
            failures: Vec::new(),
            cancelled: false,
        }
    }
}

pub struct AutoPayScheduler {
    service: Arc<BillService>,
}

impl AutoPayScheduler {
    pub fn new(service: Arc<BillService>) -> Self {
        Self { service }
    }

    /// sweep every bill once as of `now`
    ///
    /// only a failure to list the bills fails the sweep as a whole
    pub fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.sweep(now, None)
    }

    /// like `run_sweep`, stopping between bills once `cancel` fires
    pub fn run_sweep_until(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> Result<SweepReport> {
        self.sweep(now, Some(cancel))
    }

    fn sweep(&self, now: DateTime<Utc>, cancel: Option<&CancellationToken>) -> Result<SweepReport> {
        let bills = self.service.repository().list()?;
        let window = self.service.config().sweep_window();
        let mut report = SweepReport::new(now);

        for bill in &bills {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                report.cancelled = true;
                break;
            }
            report.evaluated += 1;

            if ledger::is_auto_pay_due(bill, now) {
                self.auto_pay(bill, now, &mut report);
            } else {
                self.send_notices(bill, now, window, &mut report);
            }
        }

        Ok(report)
    }

    fn auto_pay(&self, bill: &Bill, now: DateTime<Utc>, report: &mut SweepReport) {
        match self
            .service
            .pay_occurrence(bill.id, bill.next_occurrence_at, PaymentMethod::Auto, now)
        {
            Ok(payment) => report.payments.push(payment),
            Err(BillError::AlreadyPaid { .. }) => {
                debug!(bill_id = %bill.id, "occurrence paid before auto-pay reached it");
                report.already_paid += 1;
            }
            Err(
                BillError::OccurrenceMismatch { .. }
                | BillError::AutoPayNotDue { .. }
                | BillError::BillNotFound { .. },
            ) => {
                debug!(bill_id = %bill.id, "bill changed during sweep");
                report.stale += 1;
            }
            Err(error) => {
                warn!(bill_id = %bill.id, %error, "auto-pay failed");
                report.failures.push(SweepFailure {
                    bill_id: bill.id,
                    error,
                });
            }
        }
    }

    fn send_notices(&self, bill: &Bill, now: DateTime<Utc>, window: Duration, report: &mut SweepReport) {
        for notice in due_notices(bill, now, window) {
            self.service.dispatch(bill.id, &notice.message(bill));
            report.notices_sent += 1;

            let event = match notice {
                Notice::Reminder { days_before } => BillEvent::ReminderSent {
                    bill_id: bill.id,
                    occurrence_due_at: bill.next_occurrence_at,
                    days_before,
                    timestamp: now,
                },
                Notice::Overdue => BillEvent::OverdueNoticeSent {
                    bill_id: bill.id,
                    occurrence_due_at: bill.next_occurrence_at,
                    timestamp: now,
                },
            };
            self.service.emit(event);
        }
    }

    /// sweep on the configured interval until `cancel` fires
    ///
    /// the first sweep runs immediately
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.service.config().sweep_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = period.as_secs(), "auto-pay scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("auto-pay scheduler cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let now = self.service.now();
                    match self.run_sweep_until(now, &cancel) {
                        Ok(report) => {
                            info!(
                                evaluated = report.evaluated,
                                paid = report.payments.len(),
                                notices = report.notices_sent,
                                failures = report.failures.len(),
                                "auto-pay sweep finished"
                            );
                        }
                        Err(error) => warn!(%error, "auto-pay sweep could not list bills"),
                    }
                }
            }
        }
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::BillDraft;
    use crate::decimal::Money;
    use crate::recurrence::RecurrenceRule;
    use crate::repository::{BillRepository, InMemoryBillRepository};
    use crate::service::tests::{phone_bill, service_with, test_time, FlakyRepository, RecordingNotifier};
    use chrono::{NaiveDate, TimeZone};
    use std::sync::{Barrier, Mutex};

    #[test]
    fn test_autopay_fires_at_lead_and_not_again() {
        let time = test_time();
        let control = time.test_control().unwrap();
        let repo = Arc::new(InMemoryBillRepository::new());
        let service = service_with(repo.clone(), &time, Arc::new(RecordingNotifier::default()));
        let scheduler = AutoPayScheduler::new(service.clone());

        let bill = service.create_bill(phone_bill().auto_pay(3)).unwrap();
        let due = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        assert_eq!(bill.auto_pay_trigger_at, Some(Utc.with_ymd_and_hms(2024, 6, 7, 9, 0, 0).unwrap()));

        // jun 6: too early
        control.advance(Duration::days(3));
        let report = scheduler.run_sweep(time.now()).unwrap();
        assert!(report.payments.is_empty());

        // jun 7 09:00: trigger reached
        control.advance(Duration::hours(21));
        let report = scheduler.run_sweep(time.now()).unwrap();
        assert_eq!(report.payments.len(), 1);
        assert_eq!(report.payments[0].occurrence_due_at, due);
        assert_eq!(report.payments[0].method, PaymentMethod::Auto);

        // jun 8: already rolled to jul 10
        control.advance(Duration::days(1));
        let report = scheduler.run_sweep(time.now()).unwrap();
        assert!(report.payments.is_empty());

        let stored = repo.get(bill.id).unwrap().unwrap();
        assert_eq!(stored.payment_history.len(), 1);
        assert_eq!(stored.next_occurrence_at, Utc.with_ymd_and_hms(2024, 7, 10, 9, 0, 0).unwrap());
        assert_eq!(stored.auto_pay_trigger_at, Some(Utc.with_ymd_and_hms(2024, 7, 7, 9, 0, 0).unwrap()));
    }

    #[test]
    fn test_failure_is_isolated_to_one_bill() {
        let time = test_time();
        let control = time.test_control().unwrap();
        let repo = Arc::new(FlakyRepository::default());
        let service = service_with(repo.clone(), &time, Arc::new(RecordingNotifier::default()));
        let scheduler = AutoPayScheduler::new(service.clone());

        let broken = service.create_bill(phone_bill().auto_pay(0)).unwrap();
        let healthy = service
            .create_bill(
                BillDraft::new(
                    "Water",
                    Money::from_major(20),
                    NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                    RecurrenceRule::monthly_on(8),
                )
                .auto_pay(0),
            )
            .unwrap();
        repo.failing.lock().unwrap().insert(broken.id);

        control.advance(Duration::days(10));
        let report = scheduler.run_sweep(time.now()).unwrap();

        assert_eq!(report.evaluated, 2);
        assert_eq!(report.payments.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].bill_id, broken.id);
        assert!(matches!(report.failures[0].error, BillError::Persistence { .. }));
        assert_eq!(repo.get(healthy.id).unwrap().unwrap().payment_history.len(), 1);

        // retried on the next sweep once storage recovers
        repo.failing.lock().unwrap().clear();
        let report = scheduler.run_sweep(time.now()).unwrap();
        assert_eq!(report.payments.len(), 1);
        assert_eq!(report.payments[0].occurrence_due_at, broken.next_occurrence_at);
    }

    /// hands out its listing, then applies an edit before anyone can act on it
    #[derive(Default)]
    struct EditAfterListRepository {
        inner: InMemoryBillRepository,
        pending_edit: Mutex<Option<Bill>>,
    }

    impl BillRepository for EditAfterListRepository {
        fn list(&self) -> Result<Vec<Bill>> {
            let snapshot = self.inner.list()?;
            if let Some(edited) = self.pending_edit.lock().unwrap().take() {
                self.inner.save(&edited)?;
            }
            Ok(snapshot)
        }

        fn get(&self, id: BillId) -> Result<Option<Bill>> {
            self.inner.get(id)
        }

        fn save(&self, bill: &Bill) -> Result<()> {
            self.inner.save(bill)
        }

        fn delete(&self, id: BillId) -> Result<bool> {
            self.inner.delete(id)
        }
    }

    #[test]
    fn test_auto_pay_turned_off_after_listing_is_not_paid() {
        let time = test_time();
        let repo = Arc::new(EditAfterListRepository::default());
        let service = service_with(repo.clone(), &time, Arc::new(RecordingNotifier::default()));
        let scheduler = AutoPayScheduler::new(service.clone());

        let bill = service.create_bill(phone_bill().auto_pay(0)).unwrap();
        let mut edited = bill.clone();
        edited.auto_pay = false;
        edited.auto_pay_trigger_at = None;
        *repo.pending_edit.lock().unwrap() = Some(edited);

        let report = scheduler.run_sweep(bill.next_occurrence_at).unwrap();

        assert!(report.payments.is_empty());
        assert_eq!(report.stale, 1);
        assert!(report.failures.is_empty());
        let stored = repo.get(bill.id).unwrap().unwrap();
        assert!(!stored.auto_pay);
        assert!(stored.payment_history.is_empty());
    }

    #[test]
    fn test_lead_shortened_after_listing_waits_for_new_trigger() {
        let time = test_time();
        let repo = Arc::new(EditAfterListRepository::default());
        let service = service_with(repo.clone(), &time, Arc::new(RecordingNotifier::default()));
        let scheduler = AutoPayScheduler::new(service.clone());

        // lead 3 triggers jun 7; the edit moves it to the jun 10 due date
        let bill = service.create_bill(phone_bill().auto_pay(3)).unwrap();
        let mut edited = bill.clone();
        edited.auto_pay_lead_days = 0;
        edited.auto_pay_trigger_at = Some(bill.next_occurrence_at);
        *repo.pending_edit.lock().unwrap() = Some(edited);

        let jun_7 = Utc.with_ymd_and_hms(2024, 6, 7, 9, 0, 0).unwrap();
        let report = scheduler.run_sweep(jun_7).unwrap();
        assert!(report.payments.is_empty());
        assert_eq!(report.stale, 1);

        let report = scheduler.run_sweep(bill.next_occurrence_at).unwrap();
        assert_eq!(report.payments.len(), 1);
    }

    #[test]
    fn test_reminders_and_overdue_notice() {
        let time = test_time();
        let repo = Arc::new(InMemoryBillRepository::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = service_with(repo, &time, notifier.clone());
        let scheduler = AutoPayScheduler::new(service.clone());

        service.create_bill(phone_bill()).unwrap();
        service.take_events();

        let at = |d, h, m| Utc.with_ymd_and_hms(2024, 6, d, h, m, 0).unwrap();
        assert_eq!(scheduler.run_sweep(at(7, 9, 30)).unwrap().notices_sent, 1);
        assert_eq!(scheduler.run_sweep(at(7, 11, 0)).unwrap().notices_sent, 0);
        assert_eq!(scheduler.run_sweep(at(9, 9, 0)).unwrap().notices_sent, 1);
        assert_eq!(scheduler.run_sweep(at(10, 9, 0)).unwrap().notices_sent, 0);
        assert_eq!(scheduler.run_sweep(at(10, 9, 45)).unwrap().notices_sent, 1);
        assert_eq!(scheduler.run_sweep(at(10, 11, 0)).unwrap().notices_sent, 0);

        let messages: Vec<String> = notifier
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Phone is due in 3 days (45.99)",
                "Phone is due tomorrow (45.99)",
                "Phone is overdue (45.99)",
            ]
        );

        let events = service.take_events();
        assert!(matches!(events[0], BillEvent::ReminderSent { days_before: 3, .. }));
        assert!(matches!(events[2], BillEvent::OverdueNoticeSent { .. }));
    }

    #[test]
    fn test_paid_bill_gets_no_notices() {
        let time = test_time();
        let repo = Arc::new(InMemoryBillRepository::new());
        let service = service_with(repo, &time, Arc::new(RecordingNotifier::default()));

        let bill = service.create_bill(phone_bill()).unwrap();
        service.mark_paid(bill.id, bill.next_occurrence_at).unwrap();
        let paid = service.get_bill(bill.id).unwrap();

        // the occurrence after the paid one is not yet in any window
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 9, 30, 0).unwrap();
        assert!(due_notices(&paid, now, Duration::hours(1)).is_empty());
    }

    #[test]
    fn test_cancelled_sweep_stops_early() {
        let time = test_time();
        let repo = Arc::new(InMemoryBillRepository::new());
        let service = service_with(repo, &time, Arc::new(RecordingNotifier::default()));
        service.create_bill(phone_bill().auto_pay(0)).unwrap();
        let scheduler = AutoPayScheduler::new(service);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = scheduler
            .run_sweep_until(Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap(), &cancel)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.evaluated, 0);
        assert!(report.payments.is_empty());
    }

    #[test]
    fn test_sweep_and_manual_payment_race() {
        for _ in 0..50 {
            let time = test_time();
            let repo = Arc::new(InMemoryBillRepository::new());
            let service = service_with(repo.clone(), &time, Arc::new(RecordingNotifier::default()));
            let scheduler = AutoPayScheduler::new(service.clone());
            let bill = service.create_bill(phone_bill().auto_pay(0)).unwrap();
            let (id, due) = (bill.id, bill.next_occurrence_at);
            let barrier = Arc::new(Barrier::new(2));

            let manual = {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    service.pay_occurrence(id, due, PaymentMethod::Manual, due)
                })
            };
            barrier.wait();
            let report = scheduler.run_sweep(due).unwrap();
            let manual = manual.join().unwrap();

            let total = report.payments.len() + usize::from(manual.is_ok());
            assert_eq!(total, 1);
            assert_eq!(repo.get(id).unwrap().unwrap().payment_history.len(), 1);
            assert!(report.failures.is_empty());
        }
    }

    #[tokio::test]
    async fn test_spawned_scheduler_pays_then_stops_on_cancel() {
        let time = test_time();
        let repo = Arc::new(InMemoryBillRepository::new());
        let service = service_with(repo.clone(), &time, Arc::new(RecordingNotifier::default()));
        let bill = service.create_bill(phone_bill().auto_pay(7)).unwrap();

        let cancel = CancellationToken::new();
        let task = Arc::new(AutoPayScheduler::new(service)).spawn(cancel.clone());

        // the first tick fires immediately and jun 3 is past the jun 3 trigger
        let paid = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                if !repo.get(bill.id).unwrap().unwrap().payment_history.is_empty() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(paid.is_ok(), "scheduler should pay the due bill");

        cancel.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), task).await;
        assert!(result.is_ok(), "scheduler task should finish after cancel");
    }
}
