//! Last-observed entity state, keyed by entity type and id.

use entwatch_source::{EntityId, EntityRecord, FieldValue, UserRef};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The last-observed shape of one entity.
///
/// Snapshots exist purely as the diff baseline; they are never handed
/// out except embedded in a change event's `previous`/`current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Workflow status at last observation.
    pub status: String,
    /// Last modification time at last observation, epoch milliseconds.
    pub last_modified: u64,
    /// User that performed that modification, when known.
    pub modified_by: Option<UserRef>,
    /// Tracked fields at last observation.
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntitySnapshot {
    /// Captures a snapshot of a fetched record.
    #[must_use]
    pub fn from_record(record: &EntityRecord) -> Self {
        Self {
            status: record.status.clone(),
            last_modified: record.last_modified,
            modified_by: record.modified_by.clone(),
            fields: record.fields.clone(),
        }
    }
}

/// In-memory store holding at most one snapshot per
/// `(entity type, entity id)` pair.
///
/// Mutated only from the poll path; read concurrently by diagnostics.
/// There is no eviction beyond [`clear`](SnapshotStore::clear) — the
/// store grows with the number of distinct entities observed, bounded
/// in practice by the per-poll record caps.
#[derive(Debug, Default)]
pub(crate) struct SnapshotStore {
    entries: RwLock<HashMap<String, HashMap<EntityId, EntitySnapshot>>>,
}

impl SnapshotStore {
    /// Creates an empty store.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the snapshot for the given entity, if one exists.
    pub(crate) fn get(&self, entity_type: &str, entity_id: EntityId) -> Option<EntitySnapshot> {
        self.entries
            .read()
            .get(entity_type)
            .and_then(|by_id| by_id.get(&entity_id))
            .cloned()
    }

    /// Unconditionally overwrites the snapshot for the given entity.
    pub(crate) fn put(&self, entity_type: &str, entity_id: EntityId, snapshot: EntitySnapshot) {
        self.entries
            .write()
            .entry(entity_type.to_string())
            .or_default()
            .insert(entity_id, snapshot);
    }

    /// Total number of snapshots across all entity types.
    pub(crate) fn len(&self) -> usize {
        self.entries.read().values().map(HashMap::len).sum()
    }

    /// Empties the store.
    ///
    /// Every entity observed afterwards is reclassified as created on
    /// its next appearance; used to force a deliberate re-baseline.
    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: &str, modified: u64) -> EntitySnapshot {
        EntitySnapshot {
            status: status.into(),
            last_modified: modified,
            modified_by: None,
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn from_record_captures_all_tracked_state() {
        let record = EntityRecord::new(EntityId::new(1), "Open", 100)
            .with_field("Title", "A")
            .with_modified_by(UserRef::new("u1"));
        let snap = EntitySnapshot::from_record(&record);

        assert_eq!(snap.status, "Open");
        assert_eq!(snap.last_modified, 100);
        assert_eq!(snap.fields, record.fields);
        assert_eq!(snap.modified_by, record.modified_by);
    }

    #[test]
    fn get_and_put() {
        let store = SnapshotStore::new();
        assert!(store.get("task", EntityId::new(1)).is_none());

        store.put("task", EntityId::new(1), snapshot("Open", 100));
        let got = store.get("task", EntityId::new(1)).unwrap();
        assert_eq!(got.status, "Open");

        // Same id under a different type is a distinct entry.
        assert!(store.get("invoice", EntityId::new(1)).is_none());
    }

    #[test]
    fn put_overwrites_whole_snapshot() {
        let store = SnapshotStore::new();
        store.put("task", EntityId::new(1), snapshot("Open", 100));
        store.put("task", EntityId::new(1), snapshot("Closed", 200));

        assert_eq!(store.len(), 1);
        let got = store.get("task", EntityId::new(1)).unwrap();
        assert_eq!(got.status, "Closed");
        assert_eq!(got.last_modified, 200);
    }

    #[test]
    fn len_counts_across_types() {
        let store = SnapshotStore::new();
        store.put("task", EntityId::new(1), snapshot("Open", 1));
        store.put("task", EntityId::new(2), snapshot("Open", 2));
        store.put("invoice", EntityId::new(1), snapshot("Draft", 3));

        assert_eq!(store.len(), 3);
    }

    #[test]
    fn clear_empties_everything() {
        let store = SnapshotStore::new();
        store.put("task", EntityId::new(1), snapshot("Open", 1));
        store.put("invoice", EntityId::new(2), snapshot("Draft", 2));

        store.clear();
        assert_eq!(store.len(), 0);
        assert!(store.get("task", EntityId::new(1)).is_none());
    }
}
