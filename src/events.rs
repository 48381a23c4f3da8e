use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{BillId, PaymentId, PaymentMethod};

/// all events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillEvent {
    // lifecycle events
    BillCreated {
        bill_id: BillId,
        title: String,
        next_occurrence_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    BillEdited {
        bill_id: BillId,
        next_occurrence_at: DateTime<Utc>,
        auto_pay_trigger_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },
    BillDeleted {
        bill_id: BillId,
        timestamp: DateTime<Utc>,
    },

    // ledger events
    PaymentRecorded {
        bill_id: BillId,
        payment_id: PaymentId,
        occurrence_due_at: DateTime<Utc>,
        amount: Money,
        method: PaymentMethod,
        next_occurrence_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    /// occurrences passed over when a late payment rolled the bill forward
    OccurrencesSkipped {
        bill_id: BillId,
        count: u32,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    // notice events
    ReminderSent {
        bill_id: BillId,
        occurrence_due_at: DateTime<Utc>,
        days_before: u32,
        timestamp: DateTime<Utc>,
    },
    OverdueNoticeSent {
        bill_id: BillId,
        occurrence_due_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
}

impl BillEvent {
    pub fn bill_id(&self) -> BillId {
        match self {
            BillEvent::BillCreated { bill_id, .. }
            | BillEvent::BillEdited { bill_id, .. }
            | BillEvent::BillDeleted { bill_id, .. }
            | BillEvent::PaymentRecorded { bill_id, .. }
            | BillEvent::OccurrencesSkipped { bill_id, .. }
            | BillEvent::ReminderSent { bill_id, .. }
            | BillEvent::OverdueNoticeSent { bill_id, .. } => *bill_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<BillEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: BillEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<BillEvent> {
        std::mem::take(&mut self.events)
    }
}
