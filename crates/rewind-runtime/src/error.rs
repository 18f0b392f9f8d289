// Workflow error taxonomy
//
// The runtime internally distinguishes three failure shapes: explicit domain
// failures, unexpected defects, and interruption. The public API collapses
// them into a single `WorkflowError` per call: explicit failures pass
// through unchanged, defects are wrapped keeping the original error as
// `source`, and interruption becomes `Interrupted`. When failures combine,
// the first explicit failure always wins over defects.

use thiserror::Error;

use rewind_core::{ProviderError, RegistryError, StoreError};

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors surfaced by the public workflow API
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Setup-time registration failure (duplicate handler/agent, missing schema)
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Event store failure outside the per-event containment path
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Provider failure outside the per-event containment path
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The operation was interrupted (cancellation or timeout)
    #[error("Operation was interrupted")]
    Interrupted,

    /// An unexpected internal defect, with the original error as source
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Registry(e) => e.code(),
            WorkflowError::Store(_) => "STORE_ERROR",
            WorkflowError::Provider(e) => e.code(),
            WorkflowError::Interrupted => "INTERRUPTED",
            WorkflowError::Unexpected(_) => "UNEXPECTED",
        }
    }
}

/// Internal failure classification used while a run is in flight
#[derive(Debug)]
pub enum RunFailure {
    /// An explicit, typed domain failure
    Failure(WorkflowError),
    /// An unexpected defect
    Defect(anyhow::Error),
    /// Cancellation or timeout
    Interrupted,
}

impl RunFailure {
    /// Combine two failures: the first explicit failure wins over defects
    pub fn combine(self, other: RunFailure) -> RunFailure {
        match (self, other) {
            (RunFailure::Failure(f), _) => RunFailure::Failure(f),
            (_, RunFailure::Failure(f)) => RunFailure::Failure(f),
            (RunFailure::Defect(d), _) => RunFailure::Defect(d),
            (_, RunFailure::Defect(d)) => RunFailure::Defect(d),
            (RunFailure::Interrupted, RunFailure::Interrupted) => RunFailure::Interrupted,
        }
    }

    /// Collapse into the single public error shape
    pub fn into_public(self) -> WorkflowError {
        match self {
            RunFailure::Failure(f) => f,
            RunFailure::Defect(d) => WorkflowError::Unexpected(d),
            RunFailure::Interrupted => WorkflowError::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit() -> RunFailure {
        RunFailure::Failure(WorkflowError::Provider(ProviderError::InvalidRequest(
            "bad body".to_string(),
        )))
    }

    fn defect() -> RunFailure {
        RunFailure::Defect(anyhow::anyhow!("index out of bounds"))
    }

    #[test]
    fn test_first_explicit_failure_wins_over_defect() {
        let combined = explicit().combine(defect());
        assert!(matches!(combined, RunFailure::Failure(_)));

        let combined = defect().combine(explicit());
        assert!(matches!(combined, RunFailure::Failure(_)));
    }

    #[test]
    fn test_defect_wins_over_interruption() {
        let combined = defect().combine(RunFailure::Interrupted);
        assert!(matches!(combined, RunFailure::Defect(_)));
    }

    #[test]
    fn test_explicit_failure_passes_through_unchanged() {
        let public = explicit().into_public();
        match public {
            WorkflowError::Provider(e) => assert_eq!(e.code(), "INVALID_REQUEST"),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn test_defect_is_wrapped_with_source() {
        use std::error::Error as _;

        let public = defect().into_public();
        assert!(matches!(public, WorkflowError::Unexpected(_)));
        assert!(public.source().is_some());
    }

    #[test]
    fn test_interruption_is_distinct() {
        let public = RunFailure::Interrupted.into_public();
        assert!(matches!(public, WorkflowError::Interrupted));
    }
}
