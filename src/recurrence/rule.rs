use serde::{Deserialize, Serialize};

use crate::errors::{BillError, Result};
use crate::types::Frequency;

fn default_interval() -> u32 {
    1
}

/// how a bill repeats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// step size in units of `frequency`
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// monthly only; clamped to the month length
    #[serde(default)]
    pub day_of_month: Option<u32>,
    /// monthly only; overrides `day_of_month`
    #[serde(default)]
    pub last_day_of_month: bool,
    #[serde(default)]
    pub skip_weekends: bool,
}

impl RecurrenceRule {
    pub fn weekly() -> Self {
        Self {
            frequency: Frequency::Weekly,
            interval: 1,
            day_of_month: None,
            last_day_of_month: false,
            skip_weekends: false,
        }
    }

    pub fn monthly_on(day_of_month: u32) -> Self {
        Self {
            frequency: Frequency::Monthly,
            interval: 1,
            day_of_month: Some(day_of_month),
            last_day_of_month: false,
            skip_weekends: false,
        }
    }

    pub fn monthly_last_day() -> Self {
        Self {
            frequency: Frequency::Monthly,
            interval: 1,
            day_of_month: None,
            last_day_of_month: true,
            skip_weekends: false,
        }
    }

    pub fn yearly() -> Self {
        Self {
            frequency: Frequency::Yearly,
            interval: 1,
            day_of_month: None,
            last_day_of_month: false,
            skip_weekends: false,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn skipping_weekends(mut self) -> Self {
        self.skip_weekends = true;
        self
    }

    /// reject rules the calculator cannot step
    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(BillError::InvalidRecurrence {
                message: "interval must be at least 1".to_string(),
            });
        }

        if self.frequency == Frequency::Yearly && self.interval > u32::MAX / 12 {
            return Err(BillError::InvalidRecurrence {
                message: format!("yearly interval {} is too large", self.interval),
            });
        }

        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(BillError::InvalidRecurrence {
                    message: format!("day of month {} outside 1-31", day),
                });
            }
        }

        if self.frequency == Frequency::Monthly
            && self.day_of_month.is_none()
            && !self.last_day_of_month
        {
            return Err(BillError::InvalidRecurrence {
                message: "monthly rule needs a day of month or last day of month".to_string(),
            });
        }

        Ok(())
    }

    /// calendar months per step for monthly and yearly rules, `None` for weekly
    pub(crate) fn months_per_step(&self) -> Option<u32> {
        match self.frequency {
            Frequency::Weekly => None,
            Frequency::Monthly => Some(self.interval),
            Frequency::Yearly => Some(self.interval.saturating_mul(12)),
        }
    }
}
