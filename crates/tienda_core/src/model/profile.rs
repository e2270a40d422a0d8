//! Per-user profile attribute overrides.

use super::trim_optional;
use crate::overlay::ScopeValue;
use serde::{Deserialize, Serialize};

/// Nested preference overrides, merged field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_shipping_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newsletter: Option<bool>,
}

impl Preferences {
    /// True when no field carries a value worth persisting.
    pub fn is_empty(&self) -> bool {
        self.default_payment_method.is_none()
            && self.default_shipping_method.is_none()
            && self.newsletter.is_none()
    }

    /// Overlays `patch` onto `self`; blank strings clear a field.
    pub fn merge_from(&mut self, patch: &Preferences) {
        if let Some(method) = &patch.default_payment_method {
            self.default_payment_method = trim_optional(Some(method.clone()));
        }
        if let Some(method) = &patch.default_shipping_method {
            self.default_shipping_method = trim_optional(Some(method.clone()));
        }
        if let Some(newsletter) = patch.newsletter {
            self.newsletter = Some(newsletter);
        }
    }

    fn trimmed(self) -> Self {
        Self {
            default_payment_method: trim_optional(self.default_payment_method),
            default_shipping_method: trim_optional(self.default_shipping_method),
            newsletter: self.newsletter,
        }
    }
}

/// Partial profile record persisted per user scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apellido: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(rename = "avatarUrl", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferencias: Option<Preferences>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl ProfilePatch {
    /// True when the patch overrides nothing (`updatedAt` alone is not data).
    pub fn is_empty(&self) -> bool {
        self.nombre.is_none()
            && self.apellido.is_none()
            && self.telefono.is_none()
            && self.avatar_url.is_none()
            && self.preferencias.as_ref().map_or(true, Preferences::is_empty)
    }

    /// Shallow merge of top-level fields, deep merge of `preferencias`.
    ///
    /// A blank string clears the override so the server value shows again.
    /// Preferences left without any value are dropped.
    pub fn merge_from(&mut self, patch: &ProfilePatch) {
        merge_text(&mut self.nombre, &patch.nombre);
        merge_text(&mut self.apellido, &patch.apellido);
        merge_text(&mut self.telefono, &patch.telefono);
        merge_text(&mut self.avatar_url, &patch.avatar_url);

        if let Some(incoming) = &patch.preferencias {
            let mut merged = self.preferencias.take().unwrap_or_default();
            merged.merge_from(incoming);
            self.preferencias = Some(merged);
        }
        if self.preferencias.as_ref().is_some_and(Preferences::is_empty) {
            self.preferencias = None;
        }
    }

    /// Trims persisted values and drops empty preferences.
    pub(crate) fn tidied(self) -> Self {
        Self {
            nombre: trim_optional(self.nombre),
            apellido: trim_optional(self.apellido),
            telefono: trim_optional(self.telefono),
            avatar_url: trim_optional(self.avatar_url),
            preferencias: self
                .preferencias
                .map(Preferences::trimmed)
                .filter(|prefs| !prefs.is_empty()),
            updated_at: self.updated_at,
        }
    }
}

impl ScopeValue for ProfilePatch {
    fn decode(raw: serde_json::Value) -> Result<Self, String> {
        serde_json::from_value::<ProfilePatch>(raw)
            .map(ProfilePatch::tidied)
            .map_err(|err| err.to_string())
    }

    fn is_empty(&self) -> bool {
        ProfilePatch::is_empty(self)
    }
}

fn merge_text(target: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        *target = trim_optional(Some(value.clone()));
    }
}

/// Authoritative profile as delivered by the remote API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub apellido: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(rename = "avatarUrl", default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub preferencias: Preferences,
}

impl UserProfile {
    /// Read-time projection `self ⊕ patch`.
    pub fn with_overrides(&self, patch: &ProfilePatch) -> UserProfile {
        let mut merged = self.clone();
        if let Some(nombre) = &patch.nombre {
            merged.nombre = nombre.clone();
        }
        if let Some(apellido) = &patch.apellido {
            merged.apellido = apellido.clone();
        }
        if let Some(telefono) = &patch.telefono {
            merged.telefono = telefono.clone();
        }
        if patch.avatar_url.is_some() {
            merged.avatar_url = patch.avatar_url.clone();
        }
        if let Some(prefs) = &patch.preferencias {
            merged.preferencias.merge_from(prefs);
        }
        merged
    }
}
