//! Address book overlay service.
//!
//! # Responsibility
//! - Keep each user's addresses in one scoped slot.
//! - Re-establish the single-primary rule within every write.
//!
//! # Invariants
//! - Scopes are keyed by normalized email.
//! - A non-empty scope has exactly one primary address after any write.
//! - An emptied scope is removed, never stored as an empty list.
//! - Unknown scope or id yields `None`/`false`, not an error.

use super::profile_overrides::scope_key;
use crate::bus::{ChangeBus, ChangeEvent, ChangeReason, EntityKind, Subscription};
use crate::config::StoreConfig;
use crate::model::address::{
    display_order, enforce_single_primary, Address, AddressInput, AddressPatch,
};
use crate::model::identity::normalize_email;
use crate::model::now_epoch_ms;
use crate::overlay::{OverlayResult, ScopedSlot};
use crate::store::SlotStore;
use log::info;
use uuid::Uuid;

/// Per-user address collections.
pub struct AddressBook<S> {
    slot: ScopedSlot<S, Vec<Address>>,
    default_country: String,
}

impl<S: SlotStore> AddressBook<S> {
    pub fn new(store: S, bus: ChangeBus, config: &StoreConfig) -> Self {
        Self {
            slot: ScopedSlot::new(store, bus, &config.address_slot, EntityKind::Address),
            default_country: config.default_country.clone(),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.slot.bus().subscribe(Some(EntityKind::Address), callback)
    }

    /// Addresses of `email`, primary first, then newest first.
    pub fn get_user_addresses(&self, email: &str) -> Vec<Address> {
        let mut addresses = self.load(email).map(|(_, list)| list).unwrap_or_default();
        addresses.sort_by(display_order);
        addresses
    }

    pub fn get_primary_address(&self, email: &str) -> Option<Address> {
        self.get_user_addresses(email)
            .into_iter()
            .find(|address| address.is_primary)
    }

    /// Adds an address. It becomes primary when requested or when it is the
    /// first one of the scope.
    ///
    /// # Errors
    /// - `Validation` for a malformed email, blank `fullName` or `line1`.
    pub fn add_user_address(&self, email: &str, input: AddressInput) -> OverlayResult<Address> {
        let key = scope_key(email)?;
        let address = input.into_address(
            Uuid::new_v4().to_string(),
            &self.default_country,
            now_epoch_ms(),
        )?;

        let mut addresses = self.slot.scope(&key).unwrap_or_default();
        let id = address.id.clone();
        let make_primary = address.is_primary || addresses.is_empty();
        let position = addresses.len();
        addresses.push(address);
        enforce_single_primary(&mut addresses, make_primary.then_some(id.as_str()));

        let outcome = self
            .slot
            .put_scope(&key, addresses.clone(), ChangeReason::Created);
        info!(
            "event=address_add module=address status=ok count={} persisted={}",
            addresses.len(),
            outcome.is_persisted()
        );
        Ok(addresses.swap_remove(position))
    }

    /// Patches one address. `Ok(None)` when the scope or id is unknown.
    ///
    /// # Errors
    /// - `Validation` when the patched record has a blank name or line.
    pub fn update_user_address(
        &self,
        email: &str,
        id: &str,
        patch: AddressPatch,
    ) -> OverlayResult<Option<Address>> {
        let Some((key, mut addresses)) = self.load(email) else {
            return Ok(None);
        };
        let Some(position) = addresses.iter().position(|address| address.id == id) else {
            return Ok(None);
        };

        let mut next = addresses[position].clone();
        next.apply(&patch);
        next.validate()?;
        next.updated_at = Some(now_epoch_ms());
        addresses[position] = next;

        match patch.is_primary {
            Some(true) => enforce_single_primary(&mut addresses, Some(id)),
            Some(false) => enforce_single_primary(&mut addresses, None),
            None => {}
        }

        let outcome = self
            .slot
            .put_scope(&key, addresses.clone(), ChangeReason::Updated);
        info!(
            "event=address_update module=address status=ok persisted={}",
            outcome.is_persisted()
        );
        Ok(Some(addresses.swap_remove(position)))
    }

    /// Removes one address. A removed primary hands the flag to the newest
    /// remaining address; an emptied scope is deleted. Returns `false` when
    /// nothing matched.
    pub fn remove_user_address(&self, email: &str, id: &str) -> bool {
        let Some((key, mut addresses)) = self.load(email) else {
            return false;
        };
        let Some(position) = addresses.iter().position(|address| address.id == id) else {
            return false;
        };

        let removed = addresses.remove(position);
        let outcome = if addresses.is_empty() {
            self.slot.remove_scope(&key, ChangeReason::Removed)
        } else {
            if removed.is_primary {
                let newest = addresses
                    .iter()
                    .max_by_key(|address| address.created_at)
                    .map(|address| address.id.clone());
                enforce_single_primary(&mut addresses, newest.as_deref());
            }
            self.slot.put_scope(&key, addresses, ChangeReason::Deleted)
        };
        info!(
            "event=address_remove module=address status=ok persisted={}",
            outcome.is_persisted()
        );
        true
    }

    /// Makes `id` the only primary address. `None` when it does not exist.
    pub fn set_primary_user_address(&self, email: &str, id: &str) -> Option<Address> {
        let (key, mut addresses) = self.load(email)?;
        let position = addresses.iter().position(|address| address.id == id)?;

        enforce_single_primary(&mut addresses, Some(id));
        let outcome = self
            .slot
            .put_scope(&key, addresses.clone(), ChangeReason::Updated);
        info!(
            "event=address_set_primary module=address status=ok persisted={}",
            outcome.is_persisted()
        );
        Some(addresses.swap_remove(position))
    }

    fn load(&self, email: &str) -> Option<(String, Vec<Address>)> {
        let key = normalize_email(email)?;
        let addresses = self.slot.scope(&key)?;
        Some((key, addresses))
    }
}
