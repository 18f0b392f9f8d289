// Event store implementations
//
// Both stores implement the `EventStore` contract from rewind-core:
// - `InMemoryStore` for tests, examples, and ephemeral runs
// - `FileStore` for durable JSONL-per-session persistence

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

// Re-export the contract for convenience
pub use rewind_core::{EventStore, SessionMetadata, StoreError};
