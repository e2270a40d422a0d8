//! Keyed-map overlay layout: one entry per user scope (profiles, addresses).

use crate::bus::{ChangeBus, ChangeEvent, ChangeReason, EntityKind};
use crate::model::identity::normalize_email;
use crate::store::{PersistOutcome, SlotStore};
use log::{debug, error, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Value stored under one scope key.
pub trait ScopeValue: Clone + Serialize {
    /// Schema pass over untrusted persisted JSON.
    fn decode(raw: Value) -> Result<Self, String>;
    /// Empty values are never persisted; the scope entry is removed instead.
    fn is_empty(&self) -> bool;
}

/// Owns one slot holding `normalized email -> value`.
pub struct ScopedSlot<S, V> {
    store: S,
    bus: ChangeBus,
    slot: String,
    entity: EntityKind,
    _value: PhantomData<fn() -> V>,
}

impl<S: SlotStore, V: ScopeValue> ScopedSlot<S, V> {
    pub fn new(store: S, bus: ChangeBus, slot: impl Into<String>, entity: EntityKind) -> Self {
        Self {
            store,
            bus,
            slot: slot.into(),
            entity,
            _value: PhantomData,
        }
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Reads every scope, dropping entries with a blank key, an invalid
    /// value, or an empty value. Keys differing only by case collapse into
    /// one scope; the later entry wins.
    pub fn load_scopes(&self) -> BTreeMap<String, V> {
        let raw = match self.store.read_slot(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(err) => {
                warn!(
                    "event=slot_read module=overlay status=error entity={} slot={} error={err}",
                    self.entity, self.slot
                );
                return BTreeMap::new();
            }
        };

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => entries,
            Ok(_) => {
                warn!(
                    "event=slot_read module=overlay status=malformed entity={} slot={} reason=not_a_map",
                    self.entity, self.slot
                );
                return BTreeMap::new();
            }
            Err(err) => {
                warn!(
                    "event=slot_read module=overlay status=malformed entity={} slot={} error={err}",
                    self.entity, self.slot
                );
                return BTreeMap::new();
            }
        };

        let mut scopes = BTreeMap::new();
        for (raw_key, raw_value) in entries {
            let Some(key) = normalize_email(&raw_key) else {
                warn!(
                    "event=slot_read module=overlay status=discarded entity={} slot={} reason=blank_scope",
                    self.entity, self.slot
                );
                continue;
            };
            match V::decode(raw_value) {
                Ok(value) if !value.is_empty() => {
                    scopes.insert(key, value);
                }
                Ok(_) => {}
                Err(reason) => warn!(
                    "event=slot_read module=overlay status=discarded entity={} slot={} reason={reason}",
                    self.entity, self.slot
                ),
            }
        }
        scopes
    }

    /// Value stored for one normalized scope key.
    pub fn scope(&self, key: &str) -> Option<V> {
        self.load_scopes().remove(key)
    }

    /// Stores `value` under `key`; an empty value removes the scope.
    pub fn put_scope(&self, key: &str, value: V, reason: ChangeReason) -> PersistOutcome {
        let mut scopes = self.load_scopes();
        if value.is_empty() {
            scopes.remove(key);
        } else {
            scopes.insert(key.to_string(), value);
        }
        self.persist_scopes(&scopes, reason, key)
    }

    /// Deletes the scope entry outright. No write when absent.
    pub fn remove_scope(&self, key: &str, reason: ChangeReason) -> PersistOutcome {
        let mut scopes = self.load_scopes();
        if scopes.remove(key).is_none() {
            return PersistOutcome::Persisted;
        }
        self.persist_scopes(&scopes, reason, key)
    }

    fn persist_scopes(
        &self,
        scopes: &BTreeMap<String, V>,
        reason: ChangeReason,
        key: &str,
    ) -> PersistOutcome {
        let payload = match serde_json::to_string(scopes) {
            Ok(payload) => payload,
            Err(err) => {
                error!(
                    "event=slot_write module=overlay status=error entity={} slot={} error_code=encode_failed error={err}",
                    self.entity, self.slot
                );
                return PersistOutcome::Failed;
            }
        };

        if let Err(err) = self.store.write_slot(&self.slot, &payload) {
            error!(
                "event=slot_write module=overlay status=error entity={} slot={} error_code=persist_failed error={err}",
                self.entity, self.slot
            );
            return PersistOutcome::Failed;
        }

        debug!(
            "event=slot_write module=overlay status=ok entity={} slot={} scopes={}",
            self.entity,
            self.slot,
            scopes.len()
        );
        self.bus.publish(&ChangeEvent::local(
            self.entity,
            reason,
            Some(key.to_string()),
        ));
        PersistOutcome::Persisted
    }
}
