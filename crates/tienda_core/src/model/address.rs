//! Address book records and the single-primary rule.
//!
//! # Invariants
//! - A non-empty address list has exactly one entry with `is_primary`.

use super::{require_text, trim_optional, ValidationError};
use crate::overlay::ScopeValue;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// One saved address of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub is_primary: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Address {
    /// Schema pass for persisted or patched records.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingKey("id"));
        }
        require_text(&self.full_name, "fullName")?;
        require_text(&self.line1, "line1")?;
        Ok(())
    }

    /// Applies a patch; `None` fields keep their value.
    pub fn apply(&mut self, patch: &AddressPatch) {
        if let Some(full_name) = &patch.full_name {
            self.full_name = full_name.trim().to_string();
        }
        if let Some(line1) = &patch.line1 {
            self.line1 = line1.trim().to_string();
        }
        if let Some(line2) = &patch.line2 {
            self.line2 = trim_optional(Some(line2.clone()));
        }
        if let Some(city) = &patch.city {
            self.city = city.trim().to_string();
        }
        if let Some(region) = &patch.region {
            self.region = region.trim().to_string();
        }
        if let Some(postal_code) = &patch.postal_code {
            self.postal_code = trim_optional(Some(postal_code.clone()));
        }
        if let Some(country) = &patch.country {
            let country = country.trim();
            if !country.is_empty() {
                self.country = country.to_string();
            }
        }
        if let Some(is_primary) = patch.is_primary {
            self.is_primary = is_primary;
        }
    }
}

/// Input for a new address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressInput {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: Option<String>,
    /// Blank means the configured default country.
    pub country: String,
    pub is_primary: bool,
}

impl AddressInput {
    /// Validates and builds a stored address with the given identity.
    pub fn into_address(
        self,
        id: String,
        default_country: &str,
        now_ms: i64,
    ) -> Result<Address, ValidationError> {
        let country = self.country.trim();
        Ok(Address {
            id,
            full_name: require_text(&self.full_name, "fullName")?,
            line1: require_text(&self.line1, "line1")?,
            line2: trim_optional(self.line2),
            city: self.city.trim().to_string(),
            region: self.region.trim().to_string(),
            postal_code: trim_optional(self.postal_code),
            country: if country.is_empty() {
                default_country.to_string()
            } else {
                country.to_string()
            },
            is_primary: self.is_primary,
            created_at: now_ms,
            updated_at: None,
        })
    }
}

/// Partial update of an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressPatch {
    pub full_name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub is_primary: Option<bool>,
}

/// A user's address list as persisted in one scope.
///
/// Invalid or duplicate-id entries are dropped on read and the primary rule
/// is re-applied, so a damaged scope heals on the next write.
impl ScopeValue for Vec<Address> {
    fn decode(raw: Value) -> Result<Self, String> {
        let Value::Array(items) = raw else {
            return Err("address scope is not a list".to_string());
        };

        let mut ids = BTreeSet::new();
        let mut addresses = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let decoded = serde_json::from_value::<Address>(item)
                .map_err(|err| err.to_string())
                .and_then(|address| {
                    address.validate().map_err(|err| err.to_string())?;
                    Ok(address)
                });
            match decoded {
                Ok(address) if ids.insert(address.id.clone()) => addresses.push(address),
                Ok(_) => warn!(
                    "event=slot_read module=address status=discarded index={index} reason=duplicate_id"
                ),
                Err(reason) => warn!(
                    "event=slot_read module=address status=discarded index={index} reason={reason}"
                ),
            }
        }

        enforce_single_primary(&mut addresses, None);
        Ok(addresses)
    }

    fn is_empty(&self) -> bool {
        <[Address]>::is_empty(self)
    }
}

/// Re-establishes exactly one primary address in one pass.
///
/// With `primary_id`, that entry becomes primary and every other entry is
/// cleared. Otherwise the first flagged entry stays primary and later flags
/// are cleared. A non-empty list with no flag left gets its first entry
/// flagged.
pub fn enforce_single_primary(addresses: &mut [Address], primary_id: Option<&str>) {
    let mut found = false;
    for address in addresses.iter_mut() {
        let keep = match primary_id {
            Some(id) => address.id == id,
            None => address.is_primary && !found,
        };
        address.is_primary = keep;
        found |= keep;
    }
    if !found {
        if let Some(first) = addresses.first_mut() {
            first.is_primary = true;
        }
    }
}

/// Display order: primary first, then newest first, then id.
pub fn display_order(a: &Address, b: &Address) -> Ordering {
    b.is_primary
        .cmp(&a.is_primary)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}
