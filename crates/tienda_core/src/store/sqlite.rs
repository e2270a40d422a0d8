//! SQLite-backed slot store.

use super::{SlotError, SlotResult, SlotStore};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Slot store over the `overlay_slots` table of a migrated connection.
///
/// Two handles on connections to the same database file behave like two
/// browser tabs sharing one storage origin.
pub struct SqliteSlotStore<'conn> {
    conn: &'conn Connection,
    seen_revisions: RefCell<BTreeMap<String, i64>>,
}

impl<'conn> SqliteSlotStore<'conn> {
    /// Wraps a migrated connection and snapshots current slot revisions, so
    /// only writes made after this point count as external changes.
    pub fn try_new(conn: &'conn Connection) -> SlotResult<Self> {
        ensure_slot_table(conn)?;
        let seen = load_revisions(conn)?;
        Ok(Self {
            conn,
            seen_revisions: RefCell::new(seen),
        })
    }
}

impl SlotStore for SqliteSlotStore<'_> {
    fn read_slot(&self, slot: &str) -> SlotResult<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM overlay_slots WHERE slot = ?1;",
                [slot],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write_slot(&self, slot: &str, payload: &str) -> SlotResult<()> {
        let revision: i64 = self.conn.query_row(
            "INSERT INTO overlay_slots (slot, payload, revision, updated_at)
             VALUES (?1, ?2, 1, (strftime('%s', 'now') * 1000))
             ON CONFLICT(slot) DO UPDATE SET
                payload = excluded.payload,
                revision = overlay_slots.revision + 1,
                updated_at = excluded.updated_at
             RETURNING revision;",
            params![slot, payload],
            |row| row.get(0),
        )?;
        self.seen_revisions
            .borrow_mut()
            .insert(slot.to_string(), revision);
        Ok(())
    }

    fn changed_slots(&self) -> SlotResult<Vec<String>> {
        let current = load_revisions(self.conn)?;
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

fn load_revisions(conn: &Connection) -> SlotResult<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT slot, revision FROM overlay_slots;")?;
    let mut rows = stmt.query([])?;
    let mut revisions = BTreeMap::new();
    while let Some(row) = rows.next()? {
        revisions.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)?);
    }
    Ok(revisions)
}

fn ensure_slot_table(conn: &Connection) -> SlotResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'overlay_slots'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(SlotError::Unavailable(
            "overlay_slots table missing; open the database with db::open_db".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SqliteSlotStore;
    use crate::db::open_db_in_memory;
    use crate::store::{SlotError, SlotStore};
    use rusqlite::Connection;

    #[test]
    fn write_then_read_returns_latest_payload() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteSlotStore::try_new(&conn).unwrap();

        assert_eq!(store.read_slot("a").unwrap(), None);
        store.write_slot("a", "[1]").unwrap();
        store.write_slot("a", "[2]").unwrap();
        assert_eq!(store.read_slot("a").unwrap().as_deref(), Some("[2]"));
    }

    #[test]
    fn own_writes_are_not_reported_as_changed() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteSlotStore::try_new(&conn).unwrap();

        store.write_slot("a", "[]").unwrap();
        assert!(store.changed_slots().unwrap().is_empty());
    }

    #[test]
    fn unmigrated_connection_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteSlotStore::try_new(&conn).err().unwrap();
        assert!(matches!(err, SlotError::Unavailable(_)));
    }
}
