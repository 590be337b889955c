//! Registration storage.
//!
//! A [`RegistryStore`] hands out one [`RegistryTransaction`] per registration
//! attempt. The transaction covers the reference lookup and the insert, so the
//! uniqueness check on `barcode` happens atomically with the write. Dropping a
//! transaction without calling [`RegistryTransaction::commit`] rolls it back.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{CategoryReference, Registration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Shared handle to the registration store, created once at startup
pub trait RegistryStore: Send + Sync {
    /// Open a transaction scoped to a single registration attempt
    fn begin(&self) -> StoreResult<Box<dyn RegistryTransaction>>;

    /// Insert or replace a category reference row
    fn upsert_category(&self, category: &CategoryReference) -> StoreResult<()>;

    /// Read back a stored registration
    fn find_registration(&self, barcode: &str) -> StoreResult<Option<Registration>>;
}

pub trait RegistryTransaction: Send {
    fn find_category(&mut self, category_code: &str) -> StoreResult<Option<CategoryReference>>;

    /// Insert `registration` unless its barcode is already registered.
    /// Returns whether a row was written.
    fn insert_if_absent(&mut self, registration: &Registration) -> StoreResult<bool>;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn rollback(self: Box<Self>) -> StoreResult<()>;
}
