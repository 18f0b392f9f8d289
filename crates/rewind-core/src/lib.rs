// Rewind core primitives
//
// This crate provides the IO-agnostic building blocks of the orchestration
// runtime: events, the in-process event bus, handler and agent registries,
// structured-output schemas, and the provider/store contracts.
//
// Key design decisions:
// - Events are immutable records with UUIDv7 ids and chrono timestamps
// - State is a caller-chosen generic `S: Clone + PartialEq + Send + Sync`
// - Handlers are pure folds `(event, state) -> (state, events)`; at most one
//   handler per event name
// - Agents require an output schema at construction time; unvalidated LLM
//   output never drives state transitions
// - Provider and EventStore are traits so backends stay pluggable

pub mod agent;
pub mod bus;
pub mod error;
pub mod event;
pub mod handler;
pub mod pattern;
pub mod provider;
pub mod schema;
pub mod store;

// Re-exports for convenience
pub use agent::{Agent, AgentBuilder, AgentRegistry, GuardFn, OnOutputFn, PromptFn};
pub use bus::{EventBus, SubscriberFn, SubscriptionId};
pub use error::{RegistryError, StoreError};
pub use event::Event;
pub use handler::{Handler, HandlerDef, HandlerOutput, HandlerRegistry};
pub use pattern::{matches_any, matches_pattern};
pub use provider::{
    AbortSignal, MessageRole, Provider, ProviderChunk, ProviderError, ProviderMessage,
    ProviderRequest, ProviderResponse, ProviderStream, ScriptedProvider, StopReason,
};
pub use schema::{Field, Schema, SchemaError};
pub use store::{EventStore, SessionMetadata};
