use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::errors::{BillError, Result};
use crate::recurrence::calendar::{
    add_days, add_months, last_day_of_month, local_to_utc, months_between, skip_weekend,
    with_day_clamped,
};
use crate::recurrence::RecurrenceRule;
use crate::types::Frequency;

/// upper bound on stepping from the estimated index to the exact one
const MAX_STEPS: u32 = 1_000;

/// steps a bill's recurrence rule from its anchor
///
/// occurrence `k` is always derived from the anchor directly, never from
/// occurrence `k - 1`, so clamped month ends do not drift (jan 31, feb 29,
/// mar 31 rather than jan 31, feb 29, mar 29)
#[derive(Debug, Clone)]
pub struct RecurrenceCalculator<'a> {
    rule: &'a RecurrenceRule,
    anchor_date: NaiveDate,
    time_of_day: NaiveTime,
    timezone: Tz,
}

impl<'a> RecurrenceCalculator<'a> {
    pub fn new(
        rule: &'a RecurrenceRule,
        anchor_date: NaiveDate,
        time_of_day: NaiveTime,
        timezone: Tz,
    ) -> Result<Self> {
        rule.validate()?;
        Ok(Self {
            rule,
            anchor_date,
            time_of_day,
            timezone,
        })
    }

    /// the `index`-th occurrence as a utc instant
    pub fn occurrence(&self, index: u32) -> Result<DateTime<Utc>> {
        let date = self.local_date(index)?;
        local_to_utc(self.timezone, date.and_time(self.time_of_day))
    }

    /// first occurrence strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let index = self.first_index(now, false)?;
        self.occurrence(index)
    }

    /// number of occurrences strictly between `after` and `before`
    pub fn occurrences_between(&self, after: DateTime<Utc>, before: DateTime<Utc>) -> Result<u32> {
        if before <= after {
            return Ok(0);
        }
        let first = self.first_index(after, false)?;
        let end = self.first_index(before, true)?;
        Ok(end.saturating_sub(first))
    }

    fn local_date(&self, index: u32) -> Result<NaiveDate> {
        let stepped = match self.rule.months_per_step() {
            None => {
                let days = (7 * u64::from(self.rule.interval))
                    .checked_mul(u64::from(index))
                    .ok_or_else(|| BillError::CalculationError {
                        message: format!("occurrence {} overflows the calendar", index),
                    })?;
                add_days(self.anchor_date, days)?
            }
            Some(step) => {
                let months = step.checked_mul(index).ok_or_else(|| BillError::CalculationError {
                    message: format!("occurrence {} overflows the calendar", index),
                })?;
                add_months(self.anchor_date, months)?
            }
        };

        // day resolution applies to the stepped month, never before stepping
        let resolved = match self.rule.frequency {
            Frequency::Monthly if self.rule.last_day_of_month => last_day_of_month(stepped),
            Frequency::Monthly => match self.rule.day_of_month {
                Some(day) => with_day_clamped(stepped, day),
                None => stepped,
            },
            Frequency::Weekly | Frequency::Yearly => stepped,
        };

        if self.rule.skip_weekends {
            Ok(skip_weekend(resolved))
        } else {
            Ok(resolved)
        }
    }

    /// rough index near `instant`, one period early so the exact search only walks a step or two
    fn estimate_index(&self, instant: DateTime<Utc>) -> u32 {
        let local = instant.with_timezone(&self.timezone).date_naive();
        let periods = match self.rule.months_per_step() {
            None => (local - self.anchor_date).num_days() / (7 * self.rule.interval as i64),
            Some(step) => months_between(self.anchor_date, local) / step as i64,
        };
        (periods - 1).clamp(0, u32::MAX as i64) as u32
    }

    /// first index whose occurrence is after `instant` (or at it, when `inclusive`)
    fn first_index(&self, instant: DateTime<Utc>, inclusive: bool) -> Result<u32> {
        let reached = |at: DateTime<Utc>| if inclusive { at >= instant } else { at > instant };

        let mut index = self.estimate_index(instant);
        let mut steps = 0;

        while index > 0 && reached(self.occurrence(index - 1)?) {
            index -= 1;
            steps += 1;
            self.guard(steps)?;
        }

        while !reached(self.occurrence(index)?) {
            index = index.checked_add(1).ok_or_else(|| BillError::CalculationError {
                message: "occurrence index overflow".to_string(),
            })?;
            steps += 1;
            self.guard(steps)?;
        }

        Ok(index)
    }

    fn guard(&self, steps: u32) -> Result<()> {
        if steps > MAX_STEPS {
            return Err(BillError::CalculationError {
                message: format!(
                    "recurrence from {} did not converge within {} steps",
                    self.anchor_date, MAX_STEPS
                ),
            });
        }
        Ok(())
    }
}

/// next due instant strictly after `now`
pub fn next_occurrence(
    rule: &RecurrenceRule,
    anchor_date: NaiveDate,
    time_of_day: NaiveTime,
    timezone: Tz,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    RecurrenceCalculator::new(rule, anchor_date, time_of_day, timezone)?.next_after(now)
}

/// when auto-pay should fire for an occurrence; may already be in the past
pub fn auto_pay_trigger_at(next_occurrence_at: DateTime<Utc>, lead_days: u32) -> DateTime<Utc> {
    next_occurrence_at - chrono::Duration::days(lead_days as i64)
}
