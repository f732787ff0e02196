//! Read contract against the backing store.

use crate::model::EntityRecord;
use thiserror::Error;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors a source can report.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the query.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    /// A record came back in a shape the source could not map.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

/// Read access to one entity type in the backing store.
///
/// The engine treats the store as opaque and read-only; this trait is
/// the whole of what it requires. Implementations wrap whatever API the
/// store actually exposes (REST list queries, database views, ...) and
/// map rows onto [`EntityRecord`]s.
///
/// Both fetch methods must return records ordered by `last_modified`
/// ascending so that the engine observes changes oldest-first.
pub trait EntitySource: Send + Sync {
    /// The entity type this source serves (e.g. `"task"`).
    fn entity_type(&self) -> &str;

    /// Returns up to `limit` records with `last_modified > since`,
    /// oldest first. `since` is milliseconds since the Unix epoch.
    fn fetch_modified_since(&self, since: u64, limit: usize) -> SourceResult<Vec<EntityRecord>>;

    /// Returns up to `limit` current records for baseline loading,
    /// oldest first.
    fn fetch_initial(&self, limit: usize) -> SourceResult<Vec<EntityRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SourceError::Unavailable("timeout after 30s".into());
        assert_eq!(err.to_string(), "source unavailable: timeout after 30s");

        let err = SourceError::MalformedRecord("missing status column".into());
        assert!(err.to_string().contains("missing status column"));
    }
}
