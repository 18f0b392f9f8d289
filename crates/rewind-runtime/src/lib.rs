// Rewind workflow runtime
//
// This crate turns the core primitives into a running system: the
// event-processing loop (sequencing, recording, agent activation, error
// containment, termination), the tape replay engine with VCR-style controls,
// and the renderer seam for best-effort observers.
//
// Key design decisions:
// - One logical worker per run: state is folded synchronously, IO happens at
//   explicit await points, so identical event sequences always reproduce
//   identical state
// - Per-event handler/agent failures become error:occurred events and an
//   on_error callback; the run continues
// - Tapes are immutable values; navigation returns new instances and state
//   is recomputed, never diffed

pub mod error;
pub mod renderer;
pub mod runtime;
pub mod tape;

// Re-exports for convenience
pub use error::{Result, RunFailure, WorkflowError};
pub use renderer::{Renderer, TracingRenderer};
pub use rewind_core::AbortSignal;
pub use runtime::{
    process_event, ErrorCallback, EventCallback, RunOptions, StateCallback, UntilFn, Workflow,
    WorkflowResult, AGENT_COMPLETED_EVENT, AGENT_STARTED_EVENT, ERROR_EVENT,
};
pub use tape::{compute_state, Tape, TapeStatus};
