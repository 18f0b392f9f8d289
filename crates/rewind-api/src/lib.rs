// Rewind HTTP/SSE API
//
// Thin wrapper over the workflow runtime: one endpoint starts a run and
// streams it back as SSE frames, plus a health check.

pub mod cors;
pub mod routes;

pub use cors::CorsConfig;
pub use routes::{app, AppState, DoneFrame, ErrorFrame, Frame, SeedFn};
