//! Error types for the change engine.

use entwatch_source::SourceError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can surface from the engine's public operations.
///
/// Note that most failure modes inside a poll cycle never become an
/// `EngineError`: per-type fetch failures and subscriber panics are
/// logged and isolated so the scheduler keeps running.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The backing store reported an error.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The scheduler thread could not be started.
    #[error("scheduler unavailable: {0}")]
    Scheduler(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_converts() {
        fn fails() -> EngineResult<()> {
            Err(SourceError::Unavailable("down".into()))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, EngineError::Source(_)));
        assert_eq!(err.to_string(), "source error: source unavailable: down");
    }

    #[test]
    fn error_display() {
        let err = EngineError::InvalidConfig("poll interval must be positive".into());
        assert!(err.to_string().contains("poll interval"));

        let err = EngineError::Scheduler("spawn failed".into());
        assert_eq!(err.to_string(), "scheduler unavailable: spawn failed");
    }
}
