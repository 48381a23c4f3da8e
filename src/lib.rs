pub mod bill;
pub mod clock;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod notify;
pub mod recurrence;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod types;
pub mod views;

// re-export key types
pub use bill::{Bill, BillDraft};
pub use clock::{Clock, SystemClock};
pub use config::EngineConfig;
pub use decimal::Money;
pub use errors::{BillError, Result};
pub use events::{BillEvent, EventStore};
pub use ledger::Payment;
pub use notify::{NoopNotifier, NotificationDispatcher, TracingNotifier};
pub use recurrence::{auto_pay_trigger_at, next_occurrence, RecurrenceCalculator, RecurrenceRule};
pub use repository::{BillRepository, InMemoryBillRepository};
pub use scheduler::{AutoPayScheduler, Notice, SweepFailure, SweepReport};
pub use service::BillService;
pub use types::{BillFilter, BillId, DueStatus, Frequency, PaymentId, PaymentMethod};
pub use views::{BillView, DueGroups};

// re-export external dependencies that users will need
pub use chrono;
pub use chrono_tz;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use tokio_util::sync::CancellationToken;
pub use uuid::Uuid;
