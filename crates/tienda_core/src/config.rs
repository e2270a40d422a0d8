//! Store configuration.
//!
//! All fields have defaults, so a partial JSON document (or none at all) is
//! a valid configuration.

use serde::Deserialize;

/// Slot names and defaults shared by the overlay stores.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub product_slot: String,
    pub category_slot: String,
    pub profile_slot: String,
    pub address_slot: String,
    /// Country applied to new addresses whose country is blank.
    pub default_country: String,
    /// Prefix for generated product codes when the name has no alphanumerics.
    pub code_fallback_prefix: String,
    /// Number of name characters used as generated code prefix.
    pub code_prefix_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            product_slot: "tienda.products.overlay".to_string(),
            category_slot: "tienda.categories.overlay".to_string(),
            profile_slot: "tienda.profile.overrides".to_string(),
            address_slot: "tienda.addresses.overlay".to_string(),
            default_country: "Argentina".to_string(),
            code_fallback_prefix: "PROD".to_string(),
            code_prefix_len: 4,
        }
    }
}

impl StoreConfig {
    /// Parses a JSON configuration document; missing fields keep defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
