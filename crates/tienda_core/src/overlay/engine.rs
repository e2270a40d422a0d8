//! List-layout overlay engine (products, categories).
//!
//! # Invariants
//! - An overlay entry matching a base record only needs its identity field;
//!   absent or unusable fields fall back to the base record.
//! - An entry without a usable identity field is discarded on read.
//! - Single-record writes leave every other keyed entry as it was stored.

use super::{classify, Origin};
use crate::bus::{ChangeBus, ChangeEvent, ChangeReason, EntityKind};
use crate::model::ValidationError;
use crate::store::{PersistOutcome, SlotStore};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Record shape that can be layered over a base dataset.
pub trait OverlayRecord: Clone + Serialize + DeserializeOwned {
    /// Normalized identity key.
    fn key(&self) -> String;
    /// Normalized identity key of an untrusted persisted entry; `None` when
    /// the identity field is missing or blank.
    fn raw_key(raw: &Value) -> Option<String>;
    /// Schema pass for untrusted input: normalizes the key and rejects
    /// records with a missing/blank identity or invalid fields.
    fn normalized(self) -> Result<Self, ValidationError>;
    fn origin(&self) -> Origin;
    fn set_origin(&mut self, origin: Origin);
    /// Tombstone timestamp, if soft-deleted.
    fn deleted_at(&self) -> Option<i64>;
    /// Structural equality over user-visible fields; origin, timestamps and
    /// tombstone are ignored.
    fn same_fields(&self, other: &Self) -> bool;
    /// Whether `self`, read later in a slot, replaces `earlier` with the same
    /// key. Later entries win unless a record type says otherwise.
    fn supersedes(&self, _earlier: &Self) -> bool {
        true
    }
}

/// Owns one slot of the durable medium holding a list of overlay records.
pub struct OverlayEngine<S, R> {
    store: S,
    bus: ChangeBus,
    slot: String,
    entity: EntityKind,
    _record: PhantomData<fn() -> R>,
}

impl<S: SlotStore, R: OverlayRecord> OverlayEngine<S, R> {
    pub fn new(store: S, bus: ChangeBus, slot: impl Into<String>, entity: EntityKind) -> Self {
        Self {
            store,
            bus,
            slot: slot.into(),
            entity,
            _record: PhantomData,
        }
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Reads the persisted overlay list, completing each entry from the
    /// `base` record with the same key.
    ///
    /// Entries without identity, and custom entries failing the shape pass,
    /// are dropped with a warning; an unreadable or malformed slot yields an
    /// empty list. Key collisions are settled by `OverlayRecord::supersedes`,
    /// keeping the position of the first entry.
    pub fn load_overlays(&self, base: &[R]) -> Vec<R> {
        let items = self.read_items();
        if items.is_empty() {
            return Vec::new();
        }

        let base_by_key: HashMap<String, &R> =
            base.iter().map(|record| (record.key(), record)).collect();
        let mut records: Vec<R> = Vec::with_capacity(items.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (index, item) in items.into_iter().enumerate() {
            let Some(key) = R::raw_key(&item) else {
                warn!(
                    "event=slot_read module=overlay status=discarded entity={} slot={} index={index} reason=missing_key",
                    self.entity, self.slot
                );
                continue;
            };
            let decoded = match base_by_key.get(&key) {
                Some(base) => self.layer_over(base, item),
                None => decode_record::<R>(item),
            };
            let record = match decoded {
                Ok(record) => record,
                Err(reason) => {
                    warn!(
                        "event=slot_read module=overlay status=discarded entity={} slot={} index={index} reason={reason}",
                        self.entity, self.slot
                    );
                    continue;
                }
            };
            match positions.get(&key) {
                Some(&position) => {
                    if record.supersedes(&records[position]) {
                        records[position] = record;
                    }
                }
                None => {
                    positions.insert(key, records.len());
                    records.push(record);
                }
            }
        }
        records
    }

    /// Writes the full overlay list and publishes a change on success.
    pub fn persist_overlays(
        &self,
        overlays: &[R],
        reason: ChangeReason,
        key: Option<&str>,
    ) -> PersistOutcome {
        match serde_json::to_string(overlays) {
            Ok(payload) => self.write_payload(&payload, overlays.len(), reason, key),
            Err(err) => self.encode_failed(&err),
        }
    }

    /// Replaces every persisted entry for `record.key()` with `record`, or
    /// appends it. Other keyed entries are written back as they were read.
    pub fn upsert(&self, record: R, reason: ChangeReason) -> PersistOutcome {
        let key = record.key();
        let encoded = match serde_json::to_value(&record) {
            Ok(encoded) => encoded,
            Err(err) => return self.encode_failed(&err),
        };

        let mut items = self.read_items();
        let first_match = items
            .iter()
            .position(|item| R::raw_key(item).as_deref() == Some(key.as_str()));
        items.retain(|item| R::raw_key(item).is_some_and(|existing| existing != key));
        match first_match {
            Some(position) => items.insert(position.min(items.len()), encoded),
            None => items.push(encoded),
        }
        self.persist_items(&items, reason, Some(&key))
    }

    /// Deletes every persisted entry for `key`. No write when absent.
    pub fn remove(&self, key: &str, reason: ChangeReason) -> PersistOutcome {
        let mut items = self.read_items();
        if !items
            .iter()
            .any(|item| R::raw_key(item).as_deref() == Some(key))
        {
            return PersistOutcome::Persisted;
        }
        items.retain(|item| R::raw_key(item).is_some_and(|existing| existing != key));
        self.persist_items(&items, reason, Some(key))
    }

    /// Overlays the fields present in `item` onto `base`, one field at a
    /// time; a field that would make the record invalid is skipped.
    fn layer_over(&self, base: &R, item: Value) -> Result<R, String> {
        let (Ok(Value::Object(mut merged)), Value::Object(fields)) =
            (serde_json::to_value(base), item.clone())
        else {
            return decode_record::<R>(item);
        };

        for (field, value) in fields {
            let mut candidate: Map<String, Value> = merged.clone();
            candidate.insert(field.clone(), value);
            match decode_record::<R>(Value::Object(candidate.clone())) {
                Ok(_) => merged = candidate,
                Err(reason) => warn!(
                    "event=slot_read module=overlay status=field_ignored entity={} slot={} field={field} reason={reason}",
                    self.entity, self.slot
                ),
            }
        }
        decode_record::<R>(Value::Object(merged))
    }

    fn read_items(&self) -> Vec<Value> {
        let raw = match self.store.read_slot(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(
                    "event=slot_read module=overlay status=error entity={} slot={} error={err}",
                    self.entity, self.slot
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!(
                    "event=slot_read module=overlay status=malformed entity={} slot={} reason=not_a_list",
                    self.entity, self.slot
                );
                Vec::new()
            }
            Err(err) => {
                warn!(
                    "event=slot_read module=overlay status=malformed entity={} slot={} error={err}",
                    self.entity, self.slot
                );
                Vec::new()
            }
        }
    }

    fn persist_items(&self, items: &[Value], reason: ChangeReason, key: Option<&str>) -> PersistOutcome {
        match serde_json::to_string(items) {
            Ok(payload) => self.write_payload(&payload, items.len(), reason, key),
            Err(err) => self.encode_failed(&err),
        }
    }

    fn write_payload(
        &self,
        payload: &str,
        records: usize,
        reason: ChangeReason,
        key: Option<&str>,
    ) -> PersistOutcome {
        if let Err(err) = self.store.write_slot(&self.slot, payload) {
            error!(
                "event=slot_write module=overlay status=error entity={} slot={} error_code=persist_failed error={err}",
                self.entity, self.slot
            );
            return PersistOutcome::Failed;
        }

        debug!(
            "event=slot_write module=overlay status=ok entity={} slot={} records={records}",
            self.entity, self.slot
        );
        self.bus.publish(&ChangeEvent::local(
            self.entity,
            reason,
            key.map(str::to_string),
        ));
        PersistOutcome::Persisted
    }

    fn encode_failed(&self, err: &serde_json::Error) -> PersistOutcome {
        error!(
            "event=slot_write module=overlay status=error entity={} slot={} error_code=encode_failed error={err}",
            self.entity, self.slot
        );
        PersistOutcome::Failed
    }
}

fn decode_record<R: OverlayRecord>(item: Value) -> Result<R, String> {
    let record: R = serde_json::from_value(item).map_err(|err| err.to_string())?;
    record.normalized().map_err(|err| err.to_string())
}

/// Projects `base ⊕ overlays`.
///
/// Overlays are expected to be complete records, as returned by
/// `OverlayEngine::load_overlays`. Base records keep their order, custom
/// records follow in overlay order. Every output record is tagged via
/// `classify`; tombstoned records are dropped unless `include_deleted` is
/// set.
pub fn merge<R: OverlayRecord>(base: &[R], overlays: &[R], include_deleted: bool) -> Vec<R> {
    let mut merged: Vec<R> = Vec::with_capacity(base.len() + overlays.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut base_keys: Vec<bool> = Vec::new();

    for record in base {
        let key = record.key();
        if positions.contains_key(&key) {
            continue;
        }
        let mut seed = record.clone();
        seed.set_origin(classify(true, false));
        positions.insert(key, merged.len());
        merged.push(seed);
        base_keys.push(true);
    }

    for overlay in overlays {
        let key = overlay.key();
        let mut next = overlay.clone();
        match positions.get(&key) {
            Some(&position) => {
                next.set_origin(classify(base_keys[position], true));
                merged[position] = next;
            }
            None => {
                next.set_origin(classify(false, true));
                positions.insert(key, merged.len());
                merged.push(next);
                base_keys.push(false);
            }
        }
    }

    if !include_deleted {
        merged.retain(|record| record.deleted_at().is_none());
    }
    merged
}

/// True when an override carries no tombstone and matches its base record
/// field for field, i.e. persisting it would be a no-op delta.
pub fn is_redundant<R: OverlayRecord>(record: &R, base: Option<&R>) -> bool {
    record.origin() == Origin::Override
        && record.deleted_at().is_none()
        && base.is_some_and(|base| record.same_fields(base))
}
