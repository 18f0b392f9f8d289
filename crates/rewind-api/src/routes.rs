// Workflow run endpoint (SSE)
//
// POST /v1/workflows/run accepts `{ "input": string, "record": bool?,
// "session_id": uuid? }` and streams the run back as SSE frames:
// `data: {"type": "event"|"state"|"done"|"error", "data": ...}`.
//
// The body is parsed by hand from raw bytes so malformed JSON, a missing or
// non-string input, and an invalid session id each map to a deliberate 400
// instead of an extractor default.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use rewind_core::Event;
use rewind_runtime::{RunOptions, UntilFn, Workflow};

use crate::cors::CorsConfig;

// ============================================================================
// App state
// ============================================================================

/// Turns the request input into the initial event and state of a run
pub type SeedFn<S> = Arc<dyn Fn(&str) -> (Event, S) + Send + Sync>;

/// Shared state for the workflow routes
pub struct AppState<S> {
    workflow: Arc<Workflow<S>>,
    seed: SeedFn<S>,
    until: Option<UntilFn<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            workflow: Arc::clone(&self.workflow),
            seed: Arc::clone(&self.seed),
            until: self.until.clone(),
        }
    }
}

impl<S> AppState<S>
where
    S: Clone + PartialEq + Serialize + Send + Sync + 'static,
{
    pub fn new(
        workflow: Workflow<S>,
        seed: impl Fn(&str) -> (Event, S) + Send + Sync + 'static,
    ) -> Self {
        Self {
            workflow: Arc::new(workflow),
            seed: Arc::new(seed),
            until: None,
        }
    }

    /// Termination predicate applied to every run started by this endpoint
    pub fn until(mut self, predicate: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.until = Some(Arc::new(predicate));
        self
    }
}

/// Build the application router
pub fn app<S>(state: AppState<S>, cors: &CorsConfig) -> Router
where
    S: Clone + PartialEq + Serialize + Send + Sync + 'static,
{
    let mut router = Router::new()
        .route("/v1/workflows/run", post(run_workflow::<S>))
        .route("/health", get(health))
        .with_state(state);
    if let Some(layer) = cors.layer() {
        router = router.layer(layer);
    }
    router.layer(TraceLayer::new_for_http())
}

// ============================================================================
// Frames
// ============================================================================

/// One SSE frame on the run stream
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Frame {
    Event(Event),
    State(Value),
    Done(DoneFrame),
    Error(ErrorFrame),
}

#[derive(Debug, Serialize)]
pub struct DoneFrame {
    pub session_id: Uuid,
    pub terminated: bool,
    pub events: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub code: String,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

/// POST /v1/workflows/run - start a run and stream it back as SSE
async fn run_workflow<S>(State(state): State<AppState<S>>, body: Bytes) -> Response
where
    S: Clone + PartialEq + Serialize + Send + Sync + 'static,
{
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return bad_request("malformed JSON body"),
    };

    let Some(input) = request.get("input").and_then(Value::as_str) else {
        return bad_request("\"input\" must be a string");
    };
    let input = input.to_string();

    let record = request
        .get("record")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let session_id = match request.get("session_id") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => match raw.parse::<Uuid>() {
            Ok(id) => Some(id),
            Err(_) => return bad_request("\"session_id\" is not a valid UUID"),
        },
        Some(_) => return bad_request("\"session_id\" is not a valid UUID"),
    };

    let (tx, rx) = mpsc::unbounded_channel::<Frame>();

    if record && !state.workflow.has_store() {
        // Reported on the stream rather than as an HTTP failure so clients
        // consume one frame shape for every run outcome
        let _ = tx.send(Frame::Error(ErrorFrame {
            code: "STORE_UNAVAILABLE".to_string(),
            message: "Store unavailable: recording requires a configured event store".to_string(),
        }));
    } else {
        let workflow = Arc::clone(&state.workflow);
        let seed = Arc::clone(&state.seed);
        let until = state.until.clone();
        let event_tx = tx.clone();
        let state_tx = tx.clone();

        tokio::spawn(async move {
            let (initial_event, initial_state) = seed(&input);

            let mut options = RunOptions::new()
                .on_event(move |event: &Event| {
                    let _ = event_tx.send(Frame::Event(event.clone()));
                })
                .on_state_change(move |s: &S| {
                    let value = serde_json::to_value(s).unwrap_or(Value::Null);
                    let _ = state_tx.send(Frame::State(value));
                });
            if record {
                options = match session_id {
                    Some(id) => options.record_session(id),
                    None => options.record(),
                };
            }
            options.until = until;

            match workflow.run(initial_event, initial_state, options).await {
                Ok(result) => {
                    let _ = tx.send(Frame::Done(DoneFrame {
                        session_id: result.session_id,
                        terminated: result.terminated,
                        events: result.events.len(),
                    }));
                }
                Err(err) => {
                    tracing::error!(error = %err, "workflow run failed");
                    let _ = tx.send(Frame::Error(ErrorFrame {
                        code: err.code().to_string(),
                        message: err.to_string(),
                    }));
                }
            }
        });
    }

    let stream = UnboundedReceiverStream::new(rx).map(|frame| {
        let data = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, Infallible>(SseEvent::default().data(data))
    });

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}
