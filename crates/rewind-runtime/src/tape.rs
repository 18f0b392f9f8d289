// Tape - deterministic replay engine with VCR-style controls
//
// A tape is a pure, immutable view over a finite recorded event sequence.
// State at any position is recomputed by folding events[0..=position] through
// the handler map - never diffed, never memoized across calls - so identical
// arguments always reproduce identical state. Replay only folds: events
// returned by handlers are discarded, because the recording already contains
// every event that occurred, including cascaded ones.

use std::sync::Arc;

use rewind_core::{Event, HandlerRegistry};

/// Playback status of a tape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeStatus {
    Idle,
    Playing,
    Paused,
    Recording,
}

/// Recompute state by replaying `events[0..=position]` in order
///
/// `position = -1` yields the initial state unchanged; out-of-range positions
/// are clamped into `[-1, len - 1]`. Events whose name has no handler are
/// skipped silently. Handler failures are also skipped: the recording is
/// history, and a fold that failed during the run did not change state then
/// either.
pub fn compute_state<S>(
    events: &[Event],
    handlers: &HandlerRegistry<S>,
    initial_state: &S,
    position: isize,
) -> S
where
    S: Clone,
{
    let max = events.len() as isize - 1;
    let position = position.clamp(-1, max);

    let mut state = initial_state.clone();
    if position < 0 {
        return state;
    }

    for event in &events[..=position as usize] {
        if let Some(def) = handlers.get(&event.name) {
            if let Ok(output) = (def.handler)(event, &state) {
                // Replay folds state only; follow-up events are discarded
                state = output.state;
            }
        }
    }
    state
}

/// Immutable, navigable view over a recorded event sequence
///
/// Every navigation operation returns a new tape; the receiver is never
/// mutated. The state at the current position is computed once at
/// construction and cached on the instance.
#[derive(Clone)]
pub struct Tape<S> {
    events: Arc<Vec<Event>>,
    handlers: Arc<HandlerRegistry<S>>,
    initial_state: S,
    position: usize,
    status: TapeStatus,
    state: S,
}

impl<S> Tape<S>
where
    S: Clone,
{
    /// Create a tape positioned at the first event
    pub fn new(events: Vec<Event>, handlers: HandlerRegistry<S>, initial_state: S) -> Self {
        Self::with_position(events, handlers, initial_state, 0, TapeStatus::Idle)
    }

    /// Create a tape at an explicit position and status
    ///
    /// The position is clamped into `[0, max(0, len - 1)]`.
    pub fn with_position(
        events: Vec<Event>,
        handlers: HandlerRegistry<S>,
        initial_state: S,
        position: usize,
        status: TapeStatus,
    ) -> Self {
        let events = Arc::new(events);
        let handlers = Arc::new(handlers);
        let position = clamp_position(position, events.len());
        let state = compute_state(&events, &handlers, &initial_state, position as isize);
        Self {
            events,
            handlers,
            initial_state,
            position,
            status,
            state,
        }
    }

    /// The fixed recorded sequence
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn status(&self) -> TapeStatus {
        self.status
    }

    /// Cached state at the current position
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The event under the head, absent when the tape is empty
    pub fn current(&self) -> Option<&Event> {
        self.events.get(self.position)
    }

    pub fn is_recording(&self) -> bool {
        self.status == TapeStatus::Recording
    }

    pub fn is_replaying(&self) -> bool {
        matches!(self.status, TapeStatus::Playing | TapeStatus::Paused)
    }

    // ========================================================================
    // Navigation - synchronous, pure, returning a new tape
    // ========================================================================

    /// Back to position 0 with status reset to idle
    pub fn rewind(&self) -> Self {
        self.at(0, TapeStatus::Idle)
    }

    /// Advance one event; clamps at the last position
    pub fn step(&self) -> Self {
        self.at(self.position.saturating_add(1), self.status)
    }

    /// Move back one event; clamps at 0
    ///
    /// Repeated calls at the floor are idempotent and preserve cached state.
    pub fn step_back(&self) -> Self {
        if self.position == 0 {
            return self.clone();
        }
        self.at(self.position - 1, self.status)
    }

    /// Jump to a position, clamped into `[0, len - 1]`
    pub fn step_to(&self, position: usize) -> Self {
        self.at(position, self.status)
    }

    /// Keep the position, mark the tape paused
    pub fn pause(&self) -> Self {
        self.at(self.position, TapeStatus::Paused)
    }

    // ========================================================================
    // Playback - the only asynchronous operations
    // ========================================================================

    /// Advance to the end of the tape, resolving paused at the last position
    ///
    /// An empty tape resolves immediately at position 0.
    pub async fn play(&self) -> Self {
        let end = self.len().saturating_sub(1);
        self.play_to(end).await
    }

    /// Advance (or rewind) toward a target position, resolving paused there
    pub async fn play_to(&self, position: usize) -> Self {
        if self.is_empty() {
            return self.at(0, TapeStatus::Paused);
        }
        // Batch advance: replay is a pure fold, pacing belongs to callers
        self.at(position, TapeStatus::Paused)
    }

    // ========================================================================
    // Pure inspection - never alters the tape's own position
    // ========================================================================

    /// State at an arbitrary clamped position
    pub fn state_at(&self, position: usize) -> S {
        let clamped = clamp_position(position, self.events.len());
        compute_state(
            &self.events,
            &self.handlers,
            &self.initial_state,
            clamped as isize,
        )
    }

    /// Event at an arbitrary clamped position
    pub fn event_at(&self, position: usize) -> Option<&Event> {
        let clamped = clamp_position(position, self.events.len());
        self.events.get(clamped)
    }

    fn at(&self, position: usize, status: TapeStatus) -> Self {
        let position = clamp_position(position, self.events.len());
        if position == self.position {
            // Same fold input, reuse the cached state
            let mut tape = self.clone();
            tape.status = status;
            return tape;
        }
        let state = compute_state(
            &self.events,
            &self.handlers,
            &self.initial_state,
            position as isize,
        );
        Self {
            events: Arc::clone(&self.events),
            handlers: Arc::clone(&self.handlers),
            initial_state: self.initial_state.clone(),
            position,
            status,
            state,
        }
    }
}

impl<S> std::fmt::Debug for Tape<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tape")
            .field("len", &self.events.len())
            .field("position", &self.position)
            .field("status", &self.status)
            .finish()
    }
}

fn clamp_position(position: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        position.min(len - 1)
    }
}
