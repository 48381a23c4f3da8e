use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::BillId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillError {
    #[error("invalid recurrence: {message}")]
    InvalidRecurrence {
        message: String,
    },

    #[error("invalid bill: {message}")]
    InvalidBill {
        message: String,
    },

    #[error("bill {bill_id} already paid for occurrence {occurrence_due_at}")]
    AlreadyPaid {
        bill_id: BillId,
        occurrence_due_at: DateTime<Utc>,
    },

    #[error("bill {bill_id} occurrence moved: expected {expected}, current {actual}")]
    OccurrenceMismatch {
        bill_id: BillId,
        expected: DateTime<Utc>,
        actual: DateTime<Utc>,
    },

    #[error("auto-pay is not due for bill {bill_id}")]
    AutoPayNotDue {
        bill_id: BillId,
    },

    #[error("bill not found: {id}")]
    BillNotFound {
        id: BillId,
    },

    #[error("persistence error: {message}")]
    Persistence {
        message: String,
    },

    #[error("notification error: {message}")]
    Notification {
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl BillError {
    /// expected outcome of a racing or repeated payment, not a failure
    pub fn is_already_paid(&self) -> bool {
        matches!(self, BillError::AlreadyPaid { .. })
    }
}

pub type Result<T> = std::result::Result<T, BillError>;
