use std::sync::{PoisonError, RwLock};

use crate::bill::Bill;
use crate::errors::{BillError, Result};
use crate::types::BillId;

/// durable store of bill records
///
/// the engine calls `save` after every mutation and `list` at the start of
/// each sweep. implementations report failures as `BillError::Persistence`.
pub trait BillRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Bill>>;

    fn get(&self, id: BillId) -> Result<Option<Bill>>;

    /// insert or replace by id
    fn save(&self, bill: &Bill) -> Result<()>;

    /// returns whether a bill was removed
    fn delete(&self, id: BillId) -> Result<bool>;
}

/// process-local repository, insertion ordered
#[derive(Debug, Default)]
pub struct InMemoryBillRepository {
    bills: RwLock<Vec<Bill>>,
}

impl InMemoryBillRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// seed with existing records, e.g. loaded from a json export
    pub fn with_bills(bills: Vec<Bill>) -> Self {
        Self {
            bills: RwLock::new(bills),
        }
    }
}

impl BillRepository for InMemoryBillRepository {
    fn list(&self) -> Result<Vec<Bill>> {
        let bills = self.bills.read().unwrap_or_else(PoisonError::into_inner);
        Ok(bills.clone())
    }

    fn get(&self, id: BillId) -> Result<Option<Bill>> {
        let bills = self.bills.read().unwrap_or_else(PoisonError::into_inner);
        Ok(bills.iter().find(|b| b.id == id).cloned())
    }

    fn save(&self, bill: &Bill) -> Result<()> {
        let mut bills = self.bills.write().unwrap_or_else(PoisonError::into_inner);
        match bills.iter_mut().find(|b| b.id == bill.id) {
            Some(existing) => *existing = bill.clone(),
            None => bills.push(bill.clone()),
        }
        Ok(())
    }

    fn delete(&self, id: BillId) -> Result<bool> {
        let mut bills = self.bills.write().unwrap_or_else(PoisonError::into_inner);
        let before = bills.len();
        bills.retain(|b| b.id != id);
        Ok(bills.len() != before)
    }
}

/// map a storage-layer error into the engine's error type
pub fn persistence_error(err: impl std::fmt::Display) -> BillError {
    BillError::Persistence {
        message: err.to_string(),
    }
}
