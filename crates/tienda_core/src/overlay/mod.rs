//! Overlay engine: persisted deltas layered over a read-only base dataset.
//!
//! # Responsibility
//! - Load, validate, merge and persist overlay records for one slot.
//! - Classify merged records (`seed`, `custom`, `override`) in one place.
//! - Detect and prune overrides that no longer differ from their base.
//!
//! # Invariants
//! - Invalid persisted records are discarded with a warning, never raised.
//! - Tombstoned records are hidden from default views and never purged.
//! - A write replaces the whole slot; there is no partial commit.

use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod engine;
mod scoped;

pub use engine::{is_redundant, merge, OverlayEngine, OverlayRecord};
pub use scoped::{ScopeValue, ScopedSlot};

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors surfaced to callers of the overlay stores.
///
/// Storage write failures are not errors here; they are logged and reported
/// through `PersistOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    Validation(ValidationError),
    /// Identity already taken (tombstoned records included).
    DuplicateKey(String),
    /// Mutation targets a key with neither base nor overlay record.
    NotFound(String),
}

impl Display for OverlayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateKey(key) => write!(f, "duplicate key: {key}"),
            Self::NotFound(key) => write!(f, "record not found: {key}"),
        }
    }
}

impl Error for OverlayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for OverlayError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Where a merged record comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Base record, no overlay.
    #[default]
    Seed,
    /// Overlay only, no base counterpart.
    Custom,
    /// Overlay modifying a base record.
    Override,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Custom => "custom",
            Self::Override => "override",
        }
    }
}

/// Derives origin from what exists for a key.
pub fn classify(base_present: bool, overlay_present: bool) -> Origin {
    match (base_present, overlay_present) {
        (true, true) => Origin::Override,
        (false, true) => Origin::Custom,
        (_, false) => Origin::Seed,
    }
}
