//! append-only payment ledger for a single bill
//!
//! a payment is keyed by the occurrence it satisfies, not by when it was
//! made. `record_payment` refuses to pay an occurrence twice and rolls the
//! bill onto its next occurrence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bill::Bill;
use crate::decimal::Money;
use crate::errors::{BillError, Result};
use crate::types::{PaymentId, PaymentMethod};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// the `next_occurrence_at` this payment satisfied
    pub occurrence_due_at: DateTime<Utc>,
    pub paid_at: DateTime<Utc>,
    pub amount: Money,
    pub method: PaymentMethod,
    #[serde(default)]
    pub note: String,
}

/// true iff the most recent payment covers the bill's next occurrence
pub fn is_satisfied(bill: &Bill) -> bool {
    bill.payment_history
        .last()
        .is_some_and(|p| p.occurrence_due_at == bill.next_occurrence_at)
}

/// any payment in the history covers `occurrence`
pub fn has_paid(bill: &Bill, occurrence: DateTime<Utc>) -> bool {
    bill.payment_history
        .iter()
        .any(|p| p.occurrence_due_at == occurrence)
}

/// the bill's last paid-for occurrence is backed by a payment
pub fn paid_for_last_occurrence(bill: &Bill) -> bool {
    bill.last_occurrence_paid_for
        .is_some_and(|occurrence| has_paid(bill, occurrence))
}

/// auto-pay is on, its trigger has passed and the next occurrence is unpaid
pub fn is_auto_pay_due(bill: &Bill, now: DateTime<Utc>) -> bool {
    bill.auto_pay
        && !is_satisfied(bill)
        && bill.auto_pay_trigger_at.is_some_and(|trigger| trigger <= now)
}

/// pay the bill's next occurrence and roll the schedule forward
///
/// fails with `AlreadyPaid` when the next occurrence is satisfied. on any
/// error the bill is left as it was.
pub fn record_payment(bill: &mut Bill, method: PaymentMethod, now: DateTime<Utc>) -> Result<Payment> {
    if is_satisfied(bill) {
        return Err(BillError::AlreadyPaid {
            bill_id: bill.id,
            occurrence_due_at: bill.next_occurrence_at,
        });
    }

    let payment = Payment {
        id: Uuid::new_v4(),
        occurrence_due_at: bill.next_occurrence_at,
        paid_at: now,
        amount: bill.amount,
        method,
        note: String::new(),
    };

    let mut updated = bill.clone();
    updated.payment_history.push(payment.clone());
    updated.last_paid_at = Some(payment.paid_at);
    updated.last_occurrence_paid_for = Some(payment.occurrence_due_at);
    updated.refresh_schedule(now)?;

    *bill = updated;
    Ok(payment)
}
