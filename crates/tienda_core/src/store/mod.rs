//! Durable key-value medium behind the overlay stores.
//!
//! # Responsibility
//! - Define the `SlotStore` capability every overlay store is built on.
//! - Provide a SQLite implementation and an in-memory fake for tests.
//!
//! # Invariants
//! - A slot write replaces the whole slot payload or leaves it untouched.
//! - Every write bumps the slot revision; `changed_slots` reports only
//!   revisions produced by another context.
//! - Only the owning overlay engine writes a given slot.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemorySlotStore;
pub use sqlite::SqliteSlotStore;

pub type SlotResult<T> = Result<T, SlotError>;

/// Failure of the durable medium itself.
#[derive(Debug)]
pub enum SlotError {
    Db(DbError),
    /// Medium refused the operation (quota exceeded, read-only, ...).
    Unavailable(String),
}

impl Display for SlotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(reason) => write!(f, "slot storage unavailable: {reason}"),
        }
    }
}

impl Error for SlotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for SlotError {
    fn from(value: DbError) -> Self {
        match value.refusal() {
            Some(reason) => Self::Unavailable(reason.to_string()),
            None => Self::Db(value),
        }
    }
}

impl From<rusqlite::Error> for SlotError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

/// Result of writing an overlay slot.
///
/// A failed write is logged by the engine and reported here instead of as an
/// error: the caller still gets the in-memory result of its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    Failed,
}

impl PersistOutcome {
    pub fn is_persisted(self) -> bool {
        matches!(self, Self::Persisted)
    }
}

/// Storage capability injected into every overlay store.
pub trait SlotStore {
    /// Reads the raw payload of one slot; `None` when never written.
    fn read_slot(&self, slot: &str) -> SlotResult<Option<String>>;
    /// Replaces the payload of one slot.
    fn write_slot(&self, slot: &str, payload: &str) -> SlotResult<()>;
    /// Returns slots written by another context since this handle last
    /// observed them, and marks them as observed.
    fn changed_slots(&self) -> SlotResult<Vec<String>>;
}

impl<T: SlotStore + ?Sized> SlotStore for &T {
    fn read_slot(&self, slot: &str) -> SlotResult<Option<String>> {
        (**self).read_slot(slot)
    }

    fn write_slot(&self, slot: &str, payload: &str) -> SlotResult<()> {
        (**self).write_slot(slot, payload)
    }

    fn changed_slots(&self) -> SlotResult<Vec<String>> {
        (**self).changed_slots()
    }
}
