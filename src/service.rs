//! bill service: the only place bills are created, edited, paid or deleted
//!
//! every mutation of a bill runs under that bill's lock and ends with a
//! repository save, so the check-then-act of the payment ledger cannot
//! interleave between a manual payment and the auto-pay sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::bill::{Bill, BillDraft};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::errors::{BillError, Result};
use crate::events::{BillEvent, EventStore};
use crate::ledger::{self, Payment};
use crate::notify::NotificationDispatcher;
use crate::repository::BillRepository;
use crate::types::{BillFilter, BillId, PaymentMethod};
use crate::views::{self, BillView, DueGroups};

/// one mutex per bill id
#[derive(Debug, Default)]
struct BillLocks {
    inner: Mutex<HashMap<BillId, Arc<Mutex<()>>>>,
}

impl BillLocks {
    fn handle(&self, id: BillId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }

    fn forget(&self, id: BillId) {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(&id);
    }
}

pub struct BillService {
    repository: Arc<dyn BillRepository>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: EngineConfig,
    locks: BillLocks,
    events: Mutex<EventStore>,
}

impl BillService {
    pub fn new(
        repository: Arc<dyn BillRepository>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            clock,
            notifier,
            config,
            locks: BillLocks::default(),
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn repository(&self) -> &dyn BillRepository {
        self.repository.as_ref()
    }

    /// create, schedule and store a new bill
    pub fn create_bill(&self, draft: BillDraft) -> Result<Bill> {
        let now = self.clock.now();
        let bill = Bill::create(draft, &self.config, now)?;

        {
            let handle = self.locks.handle(bill.id);
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            self.repository.save(&bill)?;
        }

        info!(
            bill_id = %bill.id,
            title = %bill.title,
            next_occurrence_at = %bill.next_occurrence_at,
            auto_pay = bill.auto_pay,
            "bill created"
        );
        self.emit(BillEvent::BillCreated {
            bill_id: bill.id,
            title: bill.title.clone(),
            next_occurrence_at: bill.next_occurrence_at,
            timestamp: now,
        });
        Ok(bill)
    }

    /// replace a bill's user fields and recompute its schedule
    pub fn edit_bill(&self, id: BillId, draft: BillDraft) -> Result<Bill> {
        let now = self.clock.now();

        let bill = {
            let handle = self.locks.handle(id);
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);

            let mut bill = self.load(id)?;
            let previous = bill.next_occurrence_at;
            bill.apply_edit(draft, &self.config, now)?;
            self.repository.save(&bill)?;

            if previous != bill.next_occurrence_at {
                debug!(bill_id = %id, %previous, next = %bill.next_occurrence_at, "edit moved next occurrence");
            }
            bill
        };

        info!(bill_id = %id, next_occurrence_at = %bill.next_occurrence_at, "bill edited");
        self.emit(BillEvent::BillEdited {
            bill_id: id,
            next_occurrence_at: bill.next_occurrence_at,
            auto_pay_trigger_at: bill.auto_pay_trigger_at,
            timestamp: now,
        });
        Ok(bill)
    }

    /// manually pay the occurrence the caller is looking at
    pub fn mark_paid(&self, id: BillId, occurrence_due_at: DateTime<Utc>) -> Result<Payment> {
        self.pay_occurrence(id, occurrence_due_at, PaymentMethod::Manual, self.clock.now())
    }

    /// pay `occurrence_due_at` of bill `id`, the single path for manual and auto payments
    ///
    /// fails with `AlreadyPaid` when that occurrence already has a payment and
    /// with `OccurrenceMismatch` when the bill has moved to a different
    /// occurrence that was never paid (e.g. after an edit). an `Auto` payment
    /// also fails with `AutoPayNotDue` unless the stored bill still has
    /// auto-pay on with its trigger passed.
    pub fn pay_occurrence(
        &self,
        id: BillId,
        occurrence_due_at: DateTime<Utc>,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let (bill, payment, skipped) = {
            let handle = self.locks.handle(id);
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);

            let mut bill = self.load(id)?;
            if bill.next_occurrence_at != occurrence_due_at {
                if ledger::has_paid(&bill, occurrence_due_at) {
                    return Err(BillError::AlreadyPaid {
                        bill_id: id,
                        occurrence_due_at,
                    });
                }
                return Err(BillError::OccurrenceMismatch {
                    bill_id: id,
                    expected: occurrence_due_at,
                    actual: bill.next_occurrence_at,
                });
            }

            if method == PaymentMethod::Auto && !ledger::is_auto_pay_due(&bill, now) {
                return Err(BillError::AutoPayNotDue { bill_id: id });
            }

            let payment = ledger::record_payment(&mut bill, method, now)?;
            let skipped = bill
                .calculator()?
                .occurrences_between(payment.occurrence_due_at, bill.next_occurrence_at)?;
            self.repository.save(&bill)?;
            (bill, payment, skipped)
        };

        info!(
            bill_id = %id,
            payment_id = %payment.id,
            occurrence_due_at = %payment.occurrence_due_at,
            amount = %payment.amount,
            method = ?method,
            next_occurrence_at = %bill.next_occurrence_at,
            "payment recorded"
        );
        self.emit(BillEvent::PaymentRecorded {
            bill_id: id,
            payment_id: payment.id,
            occurrence_due_at: payment.occurrence_due_at,
            amount: payment.amount,
            method,
            next_occurrence_at: bill.next_occurrence_at,
            timestamp: now,
        });

        if skipped > 0 {
            warn!(
                bill_id = %id,
                skipped,
                after = %payment.occurrence_due_at,
                before = %bill.next_occurrence_at,
                "late payment rolled past unpaid occurrences"
            );
            self.emit(BillEvent::OccurrencesSkipped {
                bill_id: id,
                count: skipped,
                after: payment.occurrence_due_at,
                before: bill.next_occurrence_at,
                timestamp: now,
            });
            self.dispatch(
                id,
                &format!("{}: {} earlier occurrence(s) were not paid", bill.title, skipped),
            );
        }

        let verb = match method {
            PaymentMethod::Manual => "marked as paid",
            PaymentMethod::Auto => "auto-paid",
        };
        self.dispatch(id, &format!("{} {} ({})", bill.title, verb, payment.amount));

        Ok(payment)
    }

    /// remove a bill; its lock is dropped with it
    pub fn delete_bill(&self, id: BillId) -> Result<()> {
        let now = self.clock.now();
        {
            let handle = self.locks.handle(id);
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.repository.delete(id)? {
                self.locks.forget(id);
                return Err(BillError::BillNotFound { id });
            }
        }
        self.locks.forget(id);

        info!(bill_id = %id, "bill deleted");
        self.emit(BillEvent::BillDeleted {
            bill_id: id,
            timestamp: now,
        });
        Ok(())
    }

    pub fn get_bill(&self, id: BillId) -> Result<Bill> {
        self.load(id)
    }

    pub fn list_bills(&self, filter: BillFilter) -> Result<Vec<Bill>> {
        let bills = self.repository.list()?;
        Ok(bills
            .into_iter()
            .filter(|bill| views::matches_filter(bill, filter))
            .collect())
    }

    /// serializable summaries, soonest first
    pub fn views(&self, filter: BillFilter) -> Result<Vec<BillView>> {
        let now = self.clock.now();
        let mut views: Vec<BillView> = self
            .list_bills(filter)?
            .iter()
            .map(|bill| BillView::from_bill(bill, now))
            .collect();
        views.sort_by_key(|view| view.schedule.next_occurrence_at);
        Ok(views)
    }

    /// overdue / due today / upcoming grouping
    pub fn due_groups(&self, filter: BillFilter) -> Result<DueGroups> {
        let bills = self.list_bills(filter)?;
        Ok(views::group_by_due(&bills, self.clock.now()))
    }

    /// drain the events collected since the last call
    pub fn take_events(&self) -> Vec<BillEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_events()
    }

    pub(crate) fn emit(&self, event: BillEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(event);
    }

    /// fire-and-forget; a failing dispatcher never fails the caller
    pub(crate) fn dispatch(&self, bill_id: BillId, message: &str) -> bool {
        match self.notifier.notify(bill_id, message) {
            Ok(()) => true,
            Err(e) => {
                debug!(%bill_id, error = %e, "notification dropped");
                false
            }
        }
    }

    /// read a bill; a missing id also drops its lock entry
    fn load(&self, id: BillId) -> Result<Bill> {
        match self.repository.get(id)? {
            Some(bill) => Ok(bill),
            None => {
                self.locks.forget(id);
                Err(BillError::BillNotFound { id })
            }
        }
    }
}
