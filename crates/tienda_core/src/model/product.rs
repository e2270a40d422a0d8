//! Product catalog records.
//!
//! Persisted field names follow the storefront's JSON shape (`codigo`,
//! `nombre`, `precio`, ...), Rust names are English.

use super::identity::normalize_product_code;
use super::{require_text, trim_optional, ValidationError};
use crate::overlay::{Origin, OverlayRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One product as shipped in the seed catalog or persisted as overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "precio")]
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub origin: Origin,
    #[serde(rename = "deletedAt", default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    fn validate_fields(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "nombre")?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::OutOfRange("precio"));
        }
        Ok(())
    }

    /// Applies a patch; `None` fields keep their current value.
    pub fn apply(&mut self, patch: &ProductPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = &patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(category) = &patch.category {
            self.category = category.trim().to_string();
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(image) = &patch.image {
            self.image = trim_optional(image.clone());
        }
        if let Some(deleted_at) = patch.deleted_at {
            self.deleted_at = deleted_at;
        }
    }
}

impl OverlayRecord for Product {
    fn key(&self) -> String {
        self.code.clone()
    }

    fn raw_key(raw: &Value) -> Option<String> {
        raw.get("codigo")?.as_str().and_then(normalize_product_code)
    }

    fn normalized(mut self) -> Result<Self, ValidationError> {
        self.code = normalize_product_code(&self.code).ok_or(ValidationError::MissingKey("codigo"))?;
        self.validate_fields()?;
        Ok(self)
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    fn deleted_at(&self) -> Option<i64> {
        self.deleted_at
    }

    fn same_fields(&self, other: &Self) -> bool {
        self.code == other.code
            && self.name == other.name
            && self.description == other.description
            && self.category == other.category
            && self.price == other.price
            && self.stock == other.stock
            && self.image == other.image
    }
}

/// Input for creating a custom product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    /// Explicit code; generated from the name when absent or blank.
    #[serde(rename = "codigo", default)]
    pub code: Option<String>,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "precio")]
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(rename = "imagen", default)]
    pub image: Option<String>,
}

impl ProductDraft {
    /// Builds the overlay record for `code`, validating user fields.
    pub fn into_product(self, code: String, now_ms: i64) -> Result<Product, ValidationError> {
        let product = Product {
            code,
            name: require_text(&self.name, "nombre")?,
            description: self.description.trim().to_string(),
            category: self.category.trim().to_string(),
            price: self.price,
            stock: self.stock,
            image: trim_optional(self.image),
            origin: Origin::Custom,
            deleted_at: None,
            created_at: Some(now_ms),
            updated_at: Some(now_ms),
        };
        product.validate_fields()?;
        Ok(product)
    }
}

/// Partial update for an existing product.
///
/// `deleted_at` is `Some(Some(ts))` to tombstone, `Some(None)` to restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(rename = "nombre", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "categoria", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "precio", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Option<String>>,
    #[serde(skip)]
    pub deleted_at: Option<Option<i64>>,
}

impl ProductPatch {
    pub fn price(price: f64) -> Self {
        Self {
            price: Some(price),
            ..Self::default()
        }
    }

    /// Schema pass applied before a patch reaches any record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text(name, "nombre")?;
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(ValidationError::OutOfRange("precio"));
            }
        }
        Ok(())
    }
}
