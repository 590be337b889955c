use super::{RegistryStore, RegistryTransaction, StoreError, StoreResult};
use crate::types::{CategoryReference, Registration};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    categories: HashMap<String, CategoryReference>,
    registrations: HashMap<String, Registration>,
}

/// In-memory store for development/testing.
///
/// Inserts become visible as soon as they are made and are undone on rollback,
/// so other transactions may observe a row that is later rolled back. A caller
/// racing such a transaction can be told `AlreadyRegistered` for a barcode that
/// ends up unregistered; only [`super::SqliteStore`] gives the exactly-once
/// guarantee under concurrent scans.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registration_count(&self) -> usize {
        lock(&self.state).map(|s| s.registrations.len()).unwrap_or(0)
    }
}

fn lock(state: &Mutex<MemoryState>) -> StoreResult<MutexGuard<'_, MemoryState>> {
    state
        .lock()
        .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
}

impl RegistryStore for InMemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn RegistryTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            inserted: Vec::new(),
        }))
    }

    fn upsert_category(&self, category: &CategoryReference) -> StoreResult<()> {
        lock(&self.state)?
            .categories
            .insert(category.category_code.clone(), category.clone());
        Ok(())
    }

    fn find_registration(&self, barcode: &str) -> StoreResult<Option<Registration>> {
        Ok(lock(&self.state)?.registrations.get(barcode).cloned())
    }
}

struct InMemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    /// Barcodes written by this transaction, removed again on rollback
    inserted: Vec<String>,
}

impl InMemoryTransaction {
    fn undo(&mut self) -> StoreResult<()> {
        if self.inserted.is_empty() {
            return Ok(());
        }
        let mut state = lock(&self.state)?;
        for barcode in self.inserted.drain(..) {
            state.registrations.remove(&barcode);
            debug!("Rolled back in-memory registration {}", barcode);
        }
        Ok(())
    }
}

impl RegistryTransaction for InMemoryTransaction {
    fn find_category(&mut self, category_code: &str) -> StoreResult<Option<CategoryReference>> {
        Ok(lock(&self.state)?.categories.get(category_code).cloned())
    }

    fn insert_if_absent(&mut self, registration: &Registration) -> StoreResult<bool> {
        let mut state = lock(&self.state)?;
        if state.registrations.contains_key(&registration.barcode) {
            return Ok(false);
        }
        state
            .registrations
            .insert(registration.barcode.clone(), registration.clone());
        self.inserted.push(registration.barcode.clone());
        Ok(true)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.inserted.clear();
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.undo()
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        let _ = self.undo();
    }
}
