//! Domain records layered by the overlay stores.
//!
//! # Responsibility
//! - Define product, category, profile and address shapes as persisted.
//! - Validate external input in one schema pass per entity.
//!
//! # Invariants
//! - Identity keys are normalized through `identity` before use.
//! - Timestamps are Unix epoch milliseconds.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod address;
pub mod category;
pub mod identity;
pub mod product;
pub mod profile;

/// Rejected input shape or blank required field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is blank after trimming.
    BlankField(&'static str),
    /// Identity field missing or blank.
    MissingKey(&'static str),
    /// Email does not look like an address.
    InvalidEmail(String),
    /// Numeric field out of range (negative or non-finite).
    OutOfRange(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::MissingKey(field) => write!(f, "identity field `{field}` is missing"),
            Self::InvalidEmail(value) => write!(f, "invalid email: `{value}`"),
            Self::OutOfRange(field) => write!(f, "`{field}` is out of range"),
        }
    }
}

impl Error for ValidationError {}

/// Returns the trimmed value, or `BlankField` when nothing is left.
pub(crate) fn require_text(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional value, mapping blank to `None`.
pub(crate) fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
