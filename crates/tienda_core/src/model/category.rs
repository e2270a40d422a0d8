//! Category registry entries.

use super::identity::{display_category_name, normalize_category_name};
use super::ValidationError;
use crate::overlay::{Origin, OverlayRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One category, persisted as `{name, deletedAt?}`.
///
/// Legacy payloads store a bare name string; it reads as a live entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredCategory")]
pub struct Category {
    pub name: String,
    #[serde(rename = "deletedAt", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(skip_serializing)]
    pub origin: Origin,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCategory {
    Bare(String),
    Entry {
        name: String,
        #[serde(rename = "deletedAt", default)]
        deleted_at: Option<i64>,
    },
}

impl From<StoredCategory> for Category {
    fn from(value: StoredCategory) -> Self {
        match value {
            StoredCategory::Bare(name) => Self::live(name),
            StoredCategory::Entry { name, deleted_at } => Self {
                name,
                deleted_at,
                origin: Origin::Seed,
            },
        }
    }
}

impl Category {
    pub fn live(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deleted_at: None,
            origin: Origin::Seed,
        }
    }

    pub fn tombstoned(name: impl Into<String>, deleted_at: i64) -> Self {
        Self {
            name: name.into(),
            deleted_at: Some(deleted_at),
            origin: Origin::Seed,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

impl OverlayRecord for Category {
    fn key(&self) -> String {
        normalize_category_name(&self.name).unwrap_or_default()
    }

    fn raw_key(raw: &Value) -> Option<String> {
        match raw {
            Value::String(name) => normalize_category_name(name),
            Value::Object(entry) => entry.get("name")?.as_str().and_then(normalize_category_name),
            _ => None,
        }
    }

    fn normalized(mut self) -> Result<Self, ValidationError> {
        self.name = display_category_name(&self.name).ok_or(ValidationError::MissingKey("name"))?;
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
        self.key() == other.key()
    }

    /// A live entry replaces a tombstone; otherwise the first entry stays.
    fn supersedes(&self, earlier: &Self) -> bool {
        self.is_active() && !earlier.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::Category;
    use crate::overlay::OverlayRecord;

    #[test]
    fn bare_names_and_objects_both_decode() {
        let decoded: Vec<Category> =
            serde_json::from_str(r#"["Bebidas",{"name":"Limpieza","deletedAt":7}]"#).unwrap();
        assert_eq!(decoded[0], Category::live("Bebidas"));
        assert_eq!(decoded[1], Category::tombstoned("Limpieza", 7));
    }

    #[test]
    fn encodes_as_objects_without_origin() {
        let encoded = serde_json::to_string(&vec![Category::live("Bebidas")]).unwrap();
        assert_eq!(encoded, r#"[{"name":"Bebidas"}]"#);
    }

    #[test]
    fn key_is_case_insensitive() {
        assert_eq!(Category::live(" BEBIDAS ").key(), Category::live("bebidas").key());
        assert!(Category::live("  ").normalized().is_err());
    }
}
