use tracing::info;

use crate::errors::Result;
use crate::types::BillId;

/// best-effort delivery of due, overdue and payment notices
///
/// the engine logs and drops any error returned here
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, bill_id: BillId, message: &str) -> Result<()>;
}

/// discards every notice
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NotificationDispatcher for NoopNotifier {
    fn notify(&self, _bill_id: BillId, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// writes notices to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    fn notify(&self, bill_id: BillId, message: &str) -> Result<()> {
        info!(%bill_id, "{}", message);
        Ok(())
    }
}
