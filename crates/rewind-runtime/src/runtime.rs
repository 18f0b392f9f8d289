// Workflow runtime - the event-processing loop
//
// A single logical worker dequeues events in strict FIFO order, folds them
// through the handler registry, evaluates agent activation, persists to the
// store when recording, and forwards events to renderers and the bus.
// Handler and agent failures are contained: they become error:occurred
// events and an on_error callback invocation, never aborting the run.
//
// Decision: store appends are awaited (append order must match dequeue
// order); renderer dispatch is fire-and-forget; provider calls are awaited
// because their output determines which events are enqueued next.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use uuid::Uuid;

use rewind_core::{
    AbortSignal, Agent, AgentRegistry, Event, EventBus, EventStore, HandlerOutput,
    HandlerRegistry, Provider, ProviderMessage, ProviderRequest,
};

use crate::error::{Result, RunFailure, WorkflowError};
use crate::renderer::Renderer;
use crate::tape::{Tape, TapeStatus};

/// Event name synthesized for contained per-event failures
pub const ERROR_EVENT: &str = "error:occurred";
/// Event name enqueued when an agent activation begins
pub const AGENT_STARTED_EVENT: &str = "agent:started";
/// Event name enqueued when an agent activation succeeds
pub const AGENT_COMPLETED_EVENT: &str = "agent:completed";

// ============================================================================
// Callbacks and run options
// ============================================================================

pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;
pub type StateCallback<S> = Arc<dyn Fn(&S) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;
pub type UntilFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// Per-run options
pub struct RunOptions<S> {
    /// Termination predicate re-evaluated after each fully processed event
    pub until: Option<UntilFn<S>>,
    /// Persist every dequeued event to the configured store
    pub record: bool,
    /// Explicit session id, honored only when recording is enabled
    pub session_id: Option<Uuid>,
    pub on_event: Option<EventCallback>,
    pub on_state_change: Option<StateCallback<S>>,
    pub on_error: Option<ErrorCallback>,
    pub abort: Option<AbortSignal>,
    /// Behaves identically to cancellation when the deadline passes
    pub timeout: Option<Duration>,
}

impl<S> Default for RunOptions<S> {
    fn default() -> Self {
        Self {
            until: None,
            record: false,
            session_id: None,
            on_event: None,
            on_state_change: None,
            on_error: None,
            abort: None,
            timeout: None,
        }
    }
}

impl<S> RunOptions<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn until(mut self, predicate: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.until = Some(Arc::new(predicate));
        self
    }

    pub fn record(mut self) -> Self {
        self.record = true;
        self
    }

    pub fn record_session(mut self, session_id: Uuid) -> Self {
        self.record = true;
        self.session_id = Some(session_id);
        self
    }

    pub fn on_event(mut self, callback: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(callback));
        self
    }

    pub fn on_state_change(mut self, callback: impl Fn(&S) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Arc::new(callback));
        self
    }

    pub fn on_error(
        mut self,
        callback: impl Fn(&anyhow::Error) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of a completed (or interrupted) run
pub struct WorkflowResult<S> {
    /// Final fold value
    pub state: S,
    /// Complete ordered recording of every dequeued event
    pub events: Vec<Event>,
    pub session_id: Uuid,
    /// True when the `until` predicate stopped the run
    pub terminated: bool,
    /// Replayable tape built from the recording
    pub tape: Tape<S>,
}

impl<S> std::fmt::Debug for WorkflowResult<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowResult")
            .field("session_id", &self.session_id)
            .field("events", &self.events.len())
            .field("terminated", &self.terminated)
            .finish()
    }
}

// ============================================================================
// process_event - the dispatch primitive
// ============================================================================

/// Dispatch one event to its handler, propagating failures to the caller
///
/// This is the primitive the runtime loop wraps with containment; it is
/// exposed for direct, synchronous dispatch testing. When no handler is
/// registered the state passes through unchanged and no events are produced.
pub fn process_event<S: Clone>(
    event: &Event,
    state: &S,
    handlers: &HandlerRegistry<S>,
) -> anyhow::Result<HandlerOutput<S>> {
    match handlers.get(&event.name) {
        Some(def) => (def.handler)(event, state),
        None => Ok(HandlerOutput::state(state.clone())),
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// A configured workflow: registries plus the external collaborators
///
/// Services are passed in explicitly rather than resolved from an ambient
/// registry; multiple independent runs may execute concurrently with no
/// shared mutable state between them.
pub struct Workflow<S> {
    handlers: HandlerRegistry<S>,
    agents: AgentRegistry<S>,
    provider: Option<Arc<dyn Provider>>,
    store: Option<Arc<dyn EventStore>>,
    renderers: Vec<Arc<dyn Renderer<S>>>,
    bus: Option<EventBus>,
}

impl<S> Workflow<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(handlers: HandlerRegistry<S>) -> Self {
        Self {
            handlers,
            agents: AgentRegistry::new(),
            provider: None,
            store: None,
            renderers: Vec::new(),
            bus: None,
        }
    }

    pub fn agents(mut self, agents: AgentRegistry<S>) -> Self {
        self.agents = agents;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer<S>>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn handlers(&self) -> &HandlerRegistry<S> {
        &self.handlers
    }

    /// Whether a store is configured, so callers can reject recording early
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Run the event loop from an initial event and state
    ///
    /// The loop continues until the queue drains, the `until` predicate
    /// holds, or cancellation/timeout is observed. Per-event handler and
    /// agent failures are contained; setup and store failures propagate.
    pub async fn run(
        &self,
        initial_event: Event,
        initial_state: S,
        options: RunOptions<S>,
    ) -> Result<WorkflowResult<S>> {
        // An explicit session id is honored only when recording is enabled
        let session_id = if options.record {
            options.session_id.unwrap_or_else(Uuid::now_v7)
        } else {
            Uuid::now_v7()
        };
        let recording = options.record && self.store.is_some();
        if options.record && self.store.is_none() {
            return Err(RunFailure::Defect(anyhow::anyhow!(
                "recording requested but no store is configured"
            ))
            .into_public());
        }

        let deadline = options.timeout.map(|t| Instant::now() + t);
        let started = Instant::now();

        tracing::info!(
            session_id = %session_id,
            recording,
            handlers = self.handlers.len(),
            agents = self.agents.len(),
            "starting workflow run"
        );

        let mut queue: VecDeque<Event> = VecDeque::new();
        queue.push_back(initial_event);

        let mut state = initial_state.clone();
        let mut recorded: Vec<Event> = Vec::new();
        let mut terminated = false;

        loop {
            let interrupted = options.abort.as_ref().is_some_and(|a| a.is_aborted())
                || deadline.is_some_and(|d| Instant::now() >= d);
            if interrupted {
                tracing::warn!(session_id = %session_id, "run interrupted, returning partial recording");
                break;
            }

            let Some(event) = queue.pop_front() else {
                break;
            };

            // (b) Record the dequeued event before any effect observes it
            recorded.push(event.clone());
            if let Some(on_event) = &options.on_event {
                on_event(&event);
            }
            if recording {
                if let Some(store) = &self.store {
                    // Awaited so store order matches dequeue order
                    if let Err(err) = store.append(session_id, event.clone()).await {
                        return Err(RunFailure::Failure(WorkflowError::Store(err)).into_public());
                    }
                }
            }

            // (c) Renderer dispatch: fire-and-forget, errors swallowed
            self.dispatch_renderers(&event, &state);

            if let Some(bus) = &self.bus {
                bus.emit(&event);
            }

            // (d) Handler dispatch, wrapped with containment
            match process_event(&event, &state, &self.handlers) {
                Ok(output) => {
                    let changed = output.state != state;
                    state = output.state;
                    if changed {
                        if let Some(on_state_change) = &options.on_state_change {
                            on_state_change(&state);
                        }
                    }
                    queue.extend(output.events);
                }
                Err(err) => {
                    let handler = self
                        .handlers
                        .get(&event.name)
                        .map(|d| d.name.clone())
                        .unwrap_or_default();
                    tracing::warn!(
                        session_id = %session_id,
                        event_name = %event.name,
                        handler = %handler,
                        error = %err,
                        "handler failed, containing"
                    );
                    queue.push_back(error_event(
                        "HANDLER_ERROR",
                        &err,
                        &event,
                        json!({"event": event.name, "handler": handler}),
                    ));
                    if let Some(on_error) = &options.on_error {
                        on_error(&err);
                    }
                }
            }

            // (e) Agent activation against the post-fold state
            let matching: Vec<Agent<S>> = self
                .agents
                .matching(&event.name, &state)
                .into_iter()
                .cloned()
                .collect();
            for agent in matching {
                queue.push_back(Event::caused_by(
                    AGENT_STARTED_EVENT,
                    json!({"agent": agent.name, "trigger": event.name}),
                    event.id,
                ));
                match self
                    .activate_agent(&agent, &event, &state, options.abort.clone())
                    .await
                {
                    Ok(events) => {
                        queue.extend(events);
                        queue.push_back(Event::caused_by(
                            AGENT_COMPLETED_EVENT,
                            json!({"agent": agent.name, "outcome": "success"}),
                            event.id,
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(
                            session_id = %session_id,
                            agent = %agent.name,
                            error = %err,
                            "agent failed, containing"
                        );
                        queue.push_back(error_event(
                            "AGENT_ERROR",
                            &err,
                            &event,
                            json!({"event": event.name, "agent": agent.name}),
                        ));
                        if let Some(on_error) = &options.on_error {
                            on_error(&err);
                        }
                    }
                }
            }

            // (f) Termination check after the event is fully processed
            if let Some(until) = &options.until {
                if until(&state) {
                    terminated = true;
                    break;
                }
            }
        }

        tracing::info!(
            session_id = %session_id,
            events = recorded.len(),
            terminated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workflow run finished"
        );

        let tape = Tape::with_position(
            recorded.clone(),
            self.handlers.clone(),
            initial_state,
            0,
            TapeStatus::Idle,
        );

        Ok(WorkflowResult {
            state,
            events: recorded,
            session_id,
            terminated,
            tape,
        })
    }

    /// Query the provider for one agent activation and translate the output
    async fn activate_agent(
        &self,
        agent: &Agent<S>,
        event: &Event,
        state: &S,
        abort: Option<AbortSignal>,
    ) -> anyhow::Result<Vec<Event>> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("agent \"{}\" requires a provider", agent.name))?;

        let prompt = (agent.prompt)(state, event);
        let request = ProviderRequest {
            messages: vec![ProviderMessage::user(prompt)],
            model: agent.model.clone(),
            output_format: Some(agent.output_schema.to_json_value()),
            abort,
        };

        let response = provider.query(request).await?;

        // Provider-originated events ride ahead of the translated output
        let mut events = response.events;

        let output = response
            .output
            .or_else(|| {
                // Fall back to parsing the text body as a JSON document
                response
                    .text
                    .as_deref()
                    .and_then(|t| serde_json::from_str(t).ok())
            })
            .ok_or_else(|| {
                anyhow::anyhow!("agent \"{}\" received no structured output", agent.name)
            })?;

        agent
            .output_schema
            .validate(&output)
            .map_err(|e| anyhow::anyhow!("agent \"{}\" output rejected: {e}", agent.name))?;

        events.extend((agent.on_output)(&output, event));
        Ok(events)
    }

    fn dispatch_renderers(&self, event: &Event, state: &S) {
        for renderer in &self.renderers {
            if !rewind_core::matches_any(renderer.patterns(), &event.name) {
                continue;
            }
            let renderer = Arc::clone(renderer);
            let event = event.clone();
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(err) = renderer.render(&event, &state).await {
                    // Rendering is diagnostic, never load-bearing
                    tracing::debug!(
                        renderer = %renderer.name(),
                        event_name = %event.name,
                        error = %err,
                        "renderer failed"
                    );
                }
            });
        }
    }
}

/// Synthesize a contained `error:occurred` event
fn error_event(code: &str, err: &anyhow::Error, cause: &Event, context: serde_json::Value) -> Event {
    Event::caused_by(
        ERROR_EVENT,
        json!({
            "code": code,
            "message": err.to_string(),
            "recoverable": true,
            "context": context,
        }),
        cause.id,
    )
}
