use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{BillError, Result};
use crate::ledger::Payment;
use crate::recurrence::{auto_pay_trigger_at, RecurrenceCalculator, RecurrenceRule};
use crate::types::BillId;

/// user-supplied fields of a bill, used for both creation and edits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillDraft {
    pub title: String,
    pub amount: Money,
    pub anchor_date: NaiveDate,
    /// falls back to the configured default
    #[serde(default)]
    pub time_of_day: Option<NaiveTime>,
    #[serde(default)]
    pub timezone: Option<Tz>,
    pub recurrence: RecurrenceRule,
    #[serde(default)]
    pub remind_offsets: Option<Vec<u32>>,
    #[serde(default)]
    pub auto_pay: bool,
    #[serde(default)]
    pub auto_pay_lead_days: u32,
    #[serde(default)]
    pub notes: String,
}

impl BillDraft {
    pub fn new(
        title: impl Into<String>,
        amount: Money,
        anchor_date: NaiveDate,
        recurrence: RecurrenceRule,
    ) -> Self {
        Self {
            title: title.into(),
            amount,
            anchor_date,
            time_of_day: None,
            timezone: None,
            recurrence,
            remind_offsets: None,
            auto_pay: false,
            auto_pay_lead_days: 0,
            notes: String::new(),
        }
    }

    pub fn at(mut self, time_of_day: NaiveTime) -> Self {
        self.time_of_day = Some(time_of_day);
        self
    }

    pub fn in_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    /// enable auto-pay `lead_days` before each due date (0 = on the due date)
    pub fn auto_pay(mut self, lead_days: u32) -> Self {
        self.auto_pay = true;
        self.auto_pay_lead_days = lead_days;
        self
    }

    pub fn remind(mut self, offsets: Vec<u32>) -> Self {
        self.remind_offsets = Some(offsets);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        self.recurrence.validate()?;

        if self.title.trim().is_empty() {
            return Err(BillError::InvalidBill {
                message: "title is required".to_string(),
            });
        }

        if self.amount.is_negative() {
            return Err(BillError::InvalidBill {
                message: format!("amount {} is negative", self.amount),
            });
        }

        if self.auto_pay_lead_days > config.max_autopay_lead_days {
            return Err(BillError::InvalidBill {
                message: format!(
                    "auto-pay lead of {} days exceeds {}",
                    self.auto_pay_lead_days, config.max_autopay_lead_days
                ),
            });
        }

        if let Some(offset) = self
            .remind_offsets
            .iter()
            .flatten()
            .find(|offset| **offset > config.max_offset_days)
        {
            return Err(BillError::InvalidBill {
                message: format!("reminder offset {} exceeds {} days", offset, config.max_offset_days),
            });
        }

        Ok(())
    }
}

/// a recurring bill with its derived schedule and payment ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub title: String,
    pub amount: Money,
    /// first occurrence; the recurrence seed
    pub anchor_date: NaiveDate,
    pub time_of_day: NaiveTime,
    pub timezone: Tz,
    pub recurrence: RecurrenceRule,
    pub remind_offsets: Vec<u32>,
    pub auto_pay: bool,
    pub auto_pay_lead_days: u32,
    pub notes: String,

    // derived schedule
    pub next_occurrence_at: DateTime<Utc>,
    pub auto_pay_trigger_at: Option<DateTime<Utc>>,

    // ledger, append-only
    pub payment_history: Vec<Payment>,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub last_occurrence_paid_for: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// create a bill with its schedule computed from `now`
    pub fn create(draft: BillDraft, config: &EngineConfig, now: DateTime<Utc>) -> Result<Self> {
        draft.validate(config)?;

        let mut bill = Self {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            amount: draft.amount,
            anchor_date: draft.anchor_date,
            time_of_day: draft.time_of_day.unwrap_or(config.default_time_of_day),
            timezone: draft.timezone.unwrap_or(config.default_timezone),
            recurrence: draft.recurrence,
            remind_offsets: draft
                .remind_offsets
                .unwrap_or_else(|| config.default_remind_offsets.clone()),
            auto_pay: draft.auto_pay,
            auto_pay_lead_days: draft.auto_pay_lead_days,
            notes: draft.notes,
            next_occurrence_at: now,
            auto_pay_trigger_at: None,
            payment_history: Vec::new(),
            last_paid_at: None,
            last_occurrence_paid_for: None,
            created_at: now,
        };
        bill.refresh_schedule(now)?;
        Ok(bill)
    }

    /// replace the user fields and recompute the schedule
    ///
    /// the bill is left untouched when the draft is invalid
    pub fn apply_edit(&mut self, draft: BillDraft, config: &EngineConfig, now: DateTime<Utc>) -> Result<()> {
        draft.validate(config)?;

        let mut edited = self.clone();
        edited.title = draft.title.trim().to_string();
        edited.amount = draft.amount;
        edited.anchor_date = draft.anchor_date;
        edited.time_of_day = draft.time_of_day.unwrap_or(self.time_of_day);
        edited.timezone = draft.timezone.unwrap_or(self.timezone);
        edited.recurrence = draft.recurrence;
        if let Some(offsets) = draft.remind_offsets {
            edited.remind_offsets = offsets;
        }
        edited.auto_pay = draft.auto_pay;
        edited.auto_pay_lead_days = draft.auto_pay_lead_days;
        edited.notes = draft.notes;
        edited.refresh_schedule(now)?;

        *self = edited;
        Ok(())
    }

    pub fn calculator(&self) -> Result<RecurrenceCalculator<'_>> {
        RecurrenceCalculator::new(&self.recurrence, self.anchor_date, self.time_of_day, self.timezone)
    }

    /// recompute `next_occurrence_at` and `auto_pay_trigger_at`
    ///
    /// the next occurrence lands strictly after both `now` and the last
    /// occurrence already paid for, so a refreshed bill is never satisfied
    pub(crate) fn refresh_schedule(&mut self, now: DateTime<Utc>) -> Result<()> {
        let reference = match self.last_occurrence_paid_for {
            Some(paid) if paid > now => paid,
            _ => now,
        };
        self.next_occurrence_at = self.calculator()?.next_after(reference)?;
        self.auto_pay_trigger_at = self
            .auto_pay
            .then(|| auto_pay_trigger_at(self.next_occurrence_at, self.auto_pay_lead_days));
        Ok(())
    }

    /// total of every recorded payment
    pub fn total_paid(&self) -> Money {
        self.payment_history.iter().map(|p| p.amount).sum()
    }

    /// the draft that would recreate this bill's user fields
    pub fn to_draft(&self) -> BillDraft {
        BillDraft {
            title: self.title.clone(),
            amount: self.amount,
            anchor_date: self.anchor_date,
            time_of_day: Some(self.time_of_day),
            timezone: Some(self.timezone),
            recurrence: self.recurrence.clone(),
            remind_offsets: Some(self.remind_offsets.clone()),
            auto_pay: self.auto_pay,
            auto_pay_lead_days: self.auto_pay_lead_days,
            notes: self.notes.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
