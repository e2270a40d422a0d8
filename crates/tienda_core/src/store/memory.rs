//! In-memory slot store used as a test double for the durable medium.

use super::{SlotError, SlotResult, SlotStore};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Default)]
struct Medium {
    slots: BTreeMap<String, (String, i64)>,
}

/// One context attached to a shared in-memory medium.
///
/// `connect` attaches another context to the same medium, which lets tests
/// reproduce cross-tab behavior without a database file.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    medium: Rc<RefCell<Medium>>,
    seen_revisions: RefCell<BTreeMap<String, i64>>,
    fail_writes: Cell<bool>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new context to the same medium.
    pub fn connect(&self) -> Self {
        let seen = self.snapshot();
        Self {
            medium: Rc::clone(&self.medium),
            seen_revisions: RefCell::new(seen),
            fail_writes: Cell::new(false),
        }
    }

    /// Makes every subsequent write from this context fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Seeds a raw slot payload, bypassing revision tracking of this context.
    pub fn put_raw(&self, slot: &str, payload: &str) {
        let mut medium = self.medium.borrow_mut();
        let revision = medium.slots.get(slot).map_or(1, |(_, rev)| rev + 1);
        medium
            .slots
            .insert(slot.to_string(), (payload.to_string(), revision));
    }

    fn snapshot(&self) -> BTreeMap<String, i64> {
        self.medium
            .borrow()
            .slots
            .iter()
            .map(|(slot, (_, revision))| (slot.clone(), *revision))
            .collect()
    }
}

impl SlotStore for MemorySlotStore {
    fn read_slot(&self, slot: &str) -> SlotResult<Option<String>> {
        Ok(self
            .medium
            .borrow()
            .slots
            .get(slot)
            .map(|(payload, _)| payload.clone()))
    }

    fn write_slot(&self, slot: &str, payload: &str) -> SlotResult<()> {
        if self.fail_writes.get() {
            return Err(SlotError::Unavailable("quota exceeded".to_string()));
        }
        let mut medium = self.medium.borrow_mut();
        let revision = medium.slots.get(slot).map_or(1, |(_, rev)| rev + 1);
        medium
            .slots
            .insert(slot.to_string(), (payload.to_string(), revision));
        self.seen_revisions
            .borrow_mut()
            .insert(slot.to_string(), revision);
        Ok(())
    }

    fn changed_slots(&self) -> SlotResult<Vec<String>> {
        let current = self.snapshot();
        let mut seen = self.seen_revisions.borrow_mut();
        let mut changed = Vec::new();
        for (slot, revision) in current {
            if seen.get(&slot) != Some(&revision) {
                changed.push(slot.clone());
                seen.insert(slot, revision);
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::MemorySlotStore;
    use crate::store::SlotStore;

    #[test]
    fn connected_contexts_see_each_others_writes_as_changes() {
        let tab_a = MemorySlotStore::new();
        let tab_b = tab_a.connect();

        tab_a.write_slot("products", "[]").unwrap();
        assert!(tab_a.changed_slots().unwrap().is_empty());
        assert_eq!(tab_b.changed_slots().unwrap(), vec!["products".to_string()]);
        assert!(tab_b.changed_slots().unwrap().is_empty());
        assert_eq!(tab_b.read_slot("products").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn failing_writes_leave_slot_untouched() {
        let store = MemorySlotStore::new();
        store.write_slot("s", "old").unwrap();
        store.set_fail_writes(true);
        assert!(store.write_slot("s", "new").is_err());
        assert_eq!(store.read_slot("s").unwrap().as_deref(), Some("old"));
    }
}
