//! Profile attribute override service.
//!
//! # Responsibility
//! - Keep per-user partial profile patches in one scoped slot.
//! - Project patches over the server-provided profile at read time.
//!
//! # Invariants
//! - Scopes are keyed by normalized email.
//! - `preferencias` merges field by field; an empty preferences object is
//!   never persisted, and an empty patch removes the scope.

use crate::bus::{ChangeBus, ChangeEvent, ChangeReason, EntityKind, Subscription};
use crate::config::StoreConfig;
use crate::model::identity::{is_plausible_email, normalize_email};
use crate::model::now_epoch_ms;
use crate::model::profile::{ProfilePatch, UserProfile};
use crate::model::ValidationError;
use crate::overlay::{OverlayResult, ScopedSlot};
use crate::store::SlotStore;
use log::info;

/// Per-user profile patches.
pub struct ProfileOverrides<S> {
    slot: ScopedSlot<S, ProfilePatch>,
}

impl<S: SlotStore> ProfileOverrides<S> {
    pub fn new(store: S, bus: ChangeBus, config: &StoreConfig) -> Self {
        Self {
            slot: ScopedSlot::new(store, bus, &config.profile_slot, EntityKind::Profile),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.slot.bus().subscribe(Some(EntityKind::Profile), callback)
    }

    /// Stored patch for `email`; empty when none.
    pub fn get_profile_overrides(&self, email: &str) -> ProfilePatch {
        normalize_email(email)
            .and_then(|key| self.slot.scope(&key))
            .unwrap_or_default()
    }

    /// Merges `patch` into the stored patch and returns the result.
    ///
    /// # Errors
    /// - `Validation` when `email` is blank or malformed.
    pub fn update_profile_overrides(
        &self,
        email: &str,
        patch: ProfilePatch,
    ) -> OverlayResult<ProfilePatch> {
        let key = scope_key(email)?;
        let mut merged = self.slot.scope(&key).unwrap_or_default();
        merged.merge_from(&patch);

        if merged.is_empty() {
            let outcome = self.slot.remove_scope(&key, ChangeReason::Removed);
            info!(
                "event=profile_update module=profile status=cleared persisted={}",
                outcome.is_persisted()
            );
            return Ok(ProfilePatch::default());
        }

        merged.updated_at = Some(now_epoch_ms());
        let outcome = self
            .slot
            .put_scope(&key, merged.clone(), ChangeReason::Updated);
        info!(
            "event=profile_update module=profile status=ok persisted={}",
            outcome.is_persisted()
        );
        Ok(merged)
    }

    /// Removes every override of `email`.
    pub fn clear_profile_overrides(&self, email: &str) {
        if let Some(key) = normalize_email(email) {
            self.slot.remove_scope(&key, ChangeReason::Removed);
        }
    }

    /// Server profile with the stored overrides of its email applied.
    pub fn apply_to(&self, profile: &UserProfile) -> UserProfile {
        profile.with_overrides(&self.get_profile_overrides(&profile.email))
    }
}

pub(crate) fn scope_key(email: &str) -> Result<String, ValidationError> {
    let key = normalize_email(email).ok_or(ValidationError::MissingKey("email"))?;
    if !is_plausible_email(&key) {
        return Err(ValidationError::InvalidEmail(key));
    }
    Ok(key)
}
