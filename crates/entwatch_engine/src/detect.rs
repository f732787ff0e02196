//! Snapshot diffing and change classification.

use crate::snapshot::EntitySnapshot;
use entwatch_source::{EntityId, EntityRecord, UserRef};
use serde::{Deserialize, Serialize};

/// Name reported in `changed_fields` when an entity's status changed.
pub const STATUS_FIELD: &str = "Status";

/// How an entity's observed state differs from its previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// First observation; no previous snapshot existed.
    Created,
    /// Entity changed without a status transition.
    Updated,
    /// Entity's status changed. Takes classification priority over
    /// `Updated` even when other fields changed in the same poll.
    StatusChanged,
    /// Entity disappeared from the store. Declared for completeness;
    /// never produced by modified-since polling, which cannot observe
    /// deletions.
    Deleted,
}

/// A classified description of one observed entity change.
///
/// Events are immutable once constructed, consumed synchronously by the
/// dispatcher, and not retained afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Entity type the change belongs to.
    pub entity_type: String,
    /// The changed entity.
    pub entity_id: EntityId,
    /// Change classification.
    pub kind: ChangeKind,
    /// When the poll cycle that produced this event started, epoch
    /// milliseconds.
    pub observed_at: u64,
    /// State before the change; absent for first observations.
    pub previous: Option<EntitySnapshot>,
    /// State after the change.
    pub current: EntitySnapshot,
    /// Names of fields whose values differ, `"Status"` first when the
    /// status changed. Empty for first observations.
    pub changed_fields: Vec<String>,
    /// User responsible for the change, when the store exposes one.
    pub changed_by: Option<UserRef>,
}

/// Diffs a fetched record against its previous snapshot.
///
/// Classification: no snapshot means [`ChangeKind::Created`]; a status
/// difference means [`ChangeKind::StatusChanged`]; anything else is
/// [`ChangeKind::Updated`]. For the two existing-snapshot cases, every
/// tracked field whose value differs is appended to `changed_fields`
/// in the record's field order, followed by any fields the snapshot
/// had that the record no longer carries. An `Updated` event with no
/// changed fields is legal: the store bumped the entity's modification
/// time without touching any tracked field.
#[must_use]
pub fn classify(
    entity_type: &str,
    previous: Option<&EntitySnapshot>,
    record: &EntityRecord,
    observed_at: u64,
) -> ChangeEvent {
    let current = EntitySnapshot::from_record(record);

    let (kind, changed_fields) = match previous {
        None => (ChangeKind::Created, Vec::new()),
        Some(prev) => {
            let mut changed = Vec::new();
            let kind = if prev.status != record.status {
                changed.push(STATUS_FIELD.to_string());
                ChangeKind::StatusChanged
            } else {
                ChangeKind::Updated
            };
            for (name, value) in &record.fields {
                if prev.fields.get(name) != Some(value) {
                    changed.push(name.clone());
                }
            }
            for name in prev.fields.keys() {
                if !record.fields.contains_key(name) {
                    changed.push(name.clone());
                }
            }
            (kind, changed)
        }
    };

    ChangeEvent {
        entity_type: entity_type.to_string(),
        entity_id: record.id,
        kind,
        observed_at,
        previous: previous.cloned(),
        current,
        changed_fields,
        changed_by: record.modified_by.clone(),
    }
}
