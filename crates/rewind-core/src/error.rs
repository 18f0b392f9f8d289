// Error types for core primitives
//
// Registration errors fail fast at setup time, before any run starts.
// Store and schema errors are typed so callers can decide how to react.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while assembling handler and agent registries
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A second handler was registered for an event name that already has one
    #[error(
        "DUPLICATE_HANDLER: event \"{event}\" is already handled by \"{existing}\" \
         (attempted to register \"{incoming}\")"
    )]
    DuplicateHandler {
        event: String,
        existing: String,
        incoming: String,
    },

    /// A second agent was registered under an existing name
    #[error("Duplicate agent name: \"{0}\"")]
    DuplicateAgent(String),

    /// An agent was constructed without an output schema
    ///
    /// Unvalidated output cannot be trusted to drive state transitions, so
    /// this is rejected at construction time rather than at first activation.
    #[error("Agent \"{0}\" is missing an output schema")]
    MissingOutputSchema(String),
}

impl RegistryError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::DuplicateHandler { .. } => "DUPLICATE_HANDLER",
            RegistryError::DuplicateAgent(_) => "DUPLICATE_AGENT",
            RegistryError::MissingOutputSchema(_) => "MISSING_OUTPUT_SCHEMA",
        }
    }
}

/// Errors raised by event store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying IO failure (disk, serialization)
    #[error("Store IO error for session {session_id}: {message}")]
    Io { session_id: Uuid, message: String },

    /// A stored record could not be decoded
    #[error("Corrupt record in session {session_id}: {message}")]
    Corrupt { session_id: Uuid, message: String },
}

impl StoreError {
    pub fn io(session_id: Uuid, message: impl Into<String>) -> Self {
        StoreError::Io {
            session_id,
            message: message.into(),
        }
    }

    pub fn corrupt(session_id: Uuid, message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            session_id,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_handler_message_names_event_and_both_handlers() {
        let err = RegistryError::DuplicateHandler {
            event: "event:one".to_string(),
            existing: "first-handler".to_string(),
            incoming: "second-handler".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("event:one"));
        assert!(message.contains("first-handler"));
        assert!(message.contains("second-handler"));
        assert_eq!(err.code(), "DUPLICATE_HANDLER");
    }
}
