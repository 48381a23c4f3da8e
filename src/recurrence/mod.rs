//! recurrence rules and the pure functions that step them
//!
//! nothing in here reads the clock or touches storage; callers pass `now`.

pub mod calculator;
pub mod calendar;
pub mod rule;

pub use calculator::{auto_pay_trigger_at, next_occurrence, RecurrenceCalculator};
pub use rule::RecurrenceRule;
