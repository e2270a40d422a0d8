//! Change notification bus shared by the overlay stores.
//!
//! # Responsibility
//! - Fan out entity-scoped change signals to any number of subscribers.
//! - Turn slot writes from other contexts into the same signals.
//!
//! # Invariants
//! - Delivery is synchronous and best-effort: a panicking subscriber is
//!   logged and skipped, the remaining subscribers are still called.
//! - A `Subscription` releases its listener when dropped.
//! - Events carry no snapshot; subscribers re-read the store they care about.

use crate::config::StoreConfig;
use crate::store::SlotStore;
use log::{error, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// Entity family owning one overlay slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Product,
    Category,
    Profile,
    Address,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Category => "category",
            Self::Profile => "profile",
            Self::Address => "address",
        }
    }

    /// Maps a slot name back to its entity using the configured slot names.
    pub fn from_slot(config: &StoreConfig, slot: &str) -> Option<Self> {
        [
            (config.product_slot.as_str(), Self::Product),
            (config.category_slot.as_str(), Self::Category),
            (config.profile_slot.as_str(), Self::Profile),
            (config.address_slot.as_str(), Self::Address),
        ]
        .into_iter()
        .find_map(|(name, kind)| (name == slot).then_some(kind))
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a slot changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Created,
    Updated,
    Deleted,
    Restored,
    /// Whole overlay set replaced (category saves).
    Replaced,
    /// Overlay entry pruned or scope cleared.
    Removed,
    /// Slot rewritten by another context; details unknown.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Local,
    External,
}

/// One "updated" signal for an entity slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub reason: ChangeReason,
    /// Normalized key touched by the write, when known.
    pub key: Option<String>,
    pub source: ChangeSource,
}

impl ChangeEvent {
    pub fn local(entity: EntityKind, reason: ChangeReason, key: Option<String>) -> Self {
        Self {
            entity,
            reason,
            key,
            source: ChangeSource::Local,
        }
    }

    pub fn external(entity: EntityKind) -> Self {
        Self {
            entity,
            reason: ChangeReason::External,
            key: None,
            source: ChangeSource::External,
        }
    }
}

type Callback = Rc<dyn Fn(&ChangeEvent)>;

struct Listener {
    filter: Option<EntityKind>,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    listeners: RefCell<BTreeMap<u64, Listener>>,
}

/// Publish/subscribe hub. Clones share the same subscriber set.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Rc<BusInner>,
}

/// Handle keeping one listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Explicitly releases the listener.
    pub fn release(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners.borrow_mut().remove(&self.id);
        }
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. `filter = None` receives every entity.
    pub fn subscribe(
        &self,
        filter: Option<EntityKind>,
        callback: impl Fn(&ChangeEvent) + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().insert(
            id,
            Listener {
                filter,
                callback: Rc::new(callback),
            },
        );
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Delivers one event to every matching listener.
    ///
    /// Listeners are snapshotted first, so callbacks may subscribe,
    /// unsubscribe or publish re-entrantly.
    pub fn publish(&self, event: &ChangeEvent) {
        let targets: Vec<(u64, Callback)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, listener)| listener.filter.map_or(true, |kind| kind == event.entity))
            .map(|(id, listener)| (*id, Rc::clone(&listener.callback)))
            .collect();

        for (id, callback) in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(
                    "event=bus_dispatch module=bus status=error entity={} subscriber={} error_code=subscriber_panicked",
                    event.entity, id
                );
            }
        }
    }

    /// Polls the medium for slots written by another context and publishes
    /// one `External` event per affected entity.
    ///
    /// Returns the entities that were signalled. Read failures are logged and
    /// treated as "nothing changed".
    pub fn sync_external<S: SlotStore>(&self, store: &S, config: &StoreConfig) -> Vec<EntityKind> {
        let slots = match store.changed_slots() {
            Ok(slots) => slots,
            Err(err) => {
                warn!("event=external_change module=bus status=error error={err}");
                return Vec::new();
            }
        };

        let mut entities: Vec<EntityKind> = slots
            .iter()
            .filter_map(|slot| EntityKind::from_slot(config, slot))
            .collect();
        entities.sort();
        entities.dedup();

        for entity in &entities {
            info!("event=external_change module=bus status=ok entity={entity}");
            self.publish(&ChangeEvent::external(*entity));
        }
        entities
    }
}
