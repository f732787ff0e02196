//! Core record model shared by sources and the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for an entity within its entity type.
///
/// Ids are assigned by the backing store and are stable for the
/// lifetime of the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ent:{}", self.0)
    }
}

/// A typed value for a tracked field.
///
/// Sources map their native column types onto this closed set so that
/// field comparison in the engine is exhaustive rather than inferred
/// from dynamic shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Free-form text.
    Text(String),
    /// Integral number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Boolean flag.
    Boolean(bool),
    /// Point in time, milliseconds since the Unix epoch.
    Timestamp(u64),
    /// Explicitly empty value.
    Null,
}

impl FieldValue {
    /// Returns true if this value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// Reference to the user that last modified an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// Store-assigned user identifier.
    pub id: String,
    /// Display name, when the store exposes one.
    pub name: Option<String>,
}

impl UserRef {
    /// Creates a user reference with an id only.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Creates a user reference with an id and display name.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// One entity as observed from the backing store.
///
/// `status` and `last_modified` are first-class because the engine
/// classifies on them; everything else an entity type tracks lives in
/// `fields`. The `BTreeMap` fixes a deterministic field order, which
/// the engine relies on for reproducible change reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity identifier, unique within the entity type.
    pub id: EntityId,
    /// Workflow status of the entity.
    pub status: String,
    /// Last modification time, milliseconds since the Unix epoch.
    pub last_modified: u64,
    /// User that performed the last modification, when known.
    pub modified_by: Option<UserRef>,
    /// Tracked fields beyond status.
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityRecord {
    /// Creates a record with no tracked fields.
    pub fn new(id: EntityId, status: impl Into<String>, last_modified: u64) -> Self {
        Self {
            id,
            status: status.into(),
            last_modified,
            modified_by: None,
            fields: BTreeMap::new(),
        }
    }

    /// Sets a tracked field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets the modifying user.
    #[must_use]
    pub fn with_modified_by(mut self, user: UserRef) -> Self {
        self.modified_by = Some(user);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_roundtrip() {
        let id = EntityId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(id.to_string(), "ent:42");
    }

    #[test]
    fn field_value_conversions() {
        assert_eq!(FieldValue::from("a"), FieldValue::Text("a".into()));
        assert_eq!(FieldValue::from(7i64), FieldValue::Integer(7));
        assert_eq!(FieldValue::from(true), FieldValue::Boolean(true));
        assert!(FieldValue::Null.is_null());
        assert!(!FieldValue::Integer(0).is_null());
    }

    #[test]
    fn record_builder() {
        let record = EntityRecord::new(EntityId::new(1), "Open", 1000)
            .with_field("Title", "Fix login")
            .with_field("Priority", 2i64)
            .with_modified_by(UserRef::named("u7", "Dana"));

        assert_eq!(record.status, "Open");
        assert_eq!(record.fields.len(), 2);
        assert_eq!(
            record.fields.get("Title"),
            Some(&FieldValue::Text("Fix login".into()))
        );
        assert_eq!(record.modified_by.as_ref().unwrap().id, "u7");
    }

    #[test]
    fn record_field_order_is_deterministic() {
        let record = EntityRecord::new(EntityId::new(1), "Open", 0)
            .with_field("Zeta", 1i64)
            .with_field("Alpha", 2i64);

        let names: Vec<&str> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn record_serializes_to_json() {
        let record = EntityRecord::new(EntityId::new(3), "Open", 500).with_field("Count", 9i64);
        let json = serde_json::to_string(&record).unwrap();
        let back: EntityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
