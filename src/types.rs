use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a bill
pub type BillId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// recurrence cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

/// how a payment was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// user marked the bill paid
    Manual,
    /// fired by the auto-pay sweep
    Auto,
}

/// read-only filter over the bill collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillFilter {
    #[default]
    All,
    AutoPay,
    /// a payment exists for the last occurrence paid for
    Paid,
    /// the next occurrence has no payment yet
    Unpaid,
}

/// where a bill's next occurrence sits relative to now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DueStatus {
    Overdue,
    DueToday,
    Upcoming,
}
