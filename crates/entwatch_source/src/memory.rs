//! In-memory source for tests and demos.

use crate::model::{EntityId, EntityRecord};
use crate::source::{EntitySource, SourceError, SourceResult};
use parking_lot::RwLock;

/// An [`EntitySource`] backed by an in-memory record list.
///
/// Useful for engine tests and demos: records are upserted directly,
/// and fetch failures can be injected to exercise the engine's
/// isolation behavior.
pub struct MemorySource {
    entity_type: String,
    records: RwLock<Vec<EntityRecord>>,
    failing: RwLock<Option<SourceError>>,
}

impl MemorySource {
    /// Creates an empty source for the given entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            records: RwLock::new(Vec::new()),
            failing: RwLock::new(None),
        }
    }

    /// Inserts or replaces the record with the same id.
    pub fn upsert(&self, record: EntityRecord) {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Removes the record with the given id, if present.
    pub fn remove(&self, id: EntityId) {
        self.records.write().retain(|r| r.id != id);
    }

    /// Makes every subsequent fetch fail with the given error.
    pub fn fail_with(&self, error: SourceError) {
        *self.failing.write() = Some(error);
    }

    /// Clears any injected failure.
    pub fn recover(&self) {
        *self.failing.write() = None;
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the source holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_failing(&self) -> SourceResult<()> {
        match &*self.failing.read() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn sorted(mut records: Vec<EntityRecord>, limit: usize) -> Vec<EntityRecord> {
        records.sort_by_key(|r| (r.last_modified, r.id));
        records.truncate(limit);
        records
    }
}

impl EntitySource for MemorySource {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn fetch_modified_since(&self, since: u64, limit: usize) -> SourceResult<Vec<EntityRecord>> {
        self.check_failing()?;
        let records: Vec<EntityRecord> = self
            .records
            .read()
            .iter()
            // Strictly greater: "modified after" excludes the boundary.
            .filter(|r| r.last_modified > since)
            .cloned()
            .collect();
        Ok(Self::sorted(records, limit))
    }

    fn fetch_initial(&self, limit: usize) -> SourceResult<Vec<EntityRecord>> {
        self.check_failing()?;
        let records = self.records.read().clone();
        Ok(Self::sorted(records, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, status: &str, modified: u64) -> EntityRecord {
        EntityRecord::new(EntityId::new(id), status, modified)
    }

    #[test]
    fn upsert_replaces_by_id() {
        let source = MemorySource::new("task");
        source.upsert(record(1, "Open", 100));
        source.upsert(record(1, "Closed", 200));

        assert_eq!(source.len(), 1);
        let records = source.fetch_initial(10).unwrap();
        assert_eq!(records[0].status, "Closed");
    }

    #[test]
    fn modified_since_is_strict_and_ordered() {
        let source = MemorySource::new("task");
        source.upsert(record(3, "Open", 300));
        source.upsert(record(1, "Open", 100));
        source.upsert(record(2, "Open", 200));

        let records = source.fetch_modified_since(100, 10).unwrap();
        // 100 itself is excluded, remainder oldest first.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, EntityId::new(2));
        assert_eq!(records[1].id, EntityId::new(3));
    }

    #[test]
    fn fetch_respects_limit() {
        let source = MemorySource::new("task");
        for i in 1..=5 {
            source.upsert(record(i, "Open", i * 10));
        }

        let records = source.fetch_modified_since(0, 3).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, EntityId::new(1));

        let records = source.fetch_initial(2).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn injected_failure_and_recovery() {
        let source = MemorySource::new("task");
        source.upsert(record(1, "Open", 100));
        source.fail_with(SourceError::Unavailable("503".into()));

        assert!(source.fetch_modified_since(0, 10).is_err());
        assert!(source.fetch_initial(10).is_err());

        source.recover();
        assert_eq!(source.fetch_initial(10).unwrap().len(), 1);
    }

    #[test]
    fn remove_drops_record() {
        let source = MemorySource::new("task");
        source.upsert(record(1, "Open", 100));
        source.upsert(record(2, "Open", 200));
        source.remove(EntityId::new(1));

        assert_eq!(source.len(), 1);
        assert!(source
            .fetch_initial(10)
            .unwrap()
            .iter()
            .all(|r| r.id != EntityId::new(1)));
    }
}
