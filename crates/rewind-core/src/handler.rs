// Handler definitions and registry
//
// A handler is a pure fold: given an event and the current state it returns
// the next state plus zero or more follow-up events. Exactly one handler may
// be registered per event name; absence of a handler is a normal state, not
// an error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::event::Event;

/// Result of folding one event into state
#[derive(Debug, Clone)]
pub struct HandlerOutput<S> {
    /// The next state value
    pub state: S,
    /// Events to enqueue at the back of the runtime queue
    pub events: Vec<Event>,
}

impl<S> HandlerOutput<S> {
    /// Fold result with no follow-up events
    pub fn state(state: S) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    /// Fold result with follow-up events
    pub fn with_events(state: S, events: Vec<Event>) -> Self {
        Self { state, events }
    }
}

/// The fold function type
///
/// Handlers must not mutate their inputs; failures propagate to the caller
/// and are contained by the runtime loop, never by the handler itself.
pub type Handler<S> = Arc<dyn Fn(&Event, &S) -> anyhow::Result<HandlerOutput<S>> + Send + Sync>;

/// A named handler bound to one event name
#[derive(Clone)]
pub struct HandlerDef<S> {
    /// Handler name, used in diagnostics only
    pub name: String,
    /// Event name this handler folds
    pub handles: String,
    pub handler: Handler<S>,
}

impl<S> HandlerDef<S> {
    pub fn new(
        name: impl Into<String>,
        handles: impl Into<String>,
        handler: impl Fn(&Event, &S) -> anyhow::Result<HandlerOutput<S>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            handles: handles.into(),
            handler: Arc::new(handler),
        }
    }
}

impl<S> std::fmt::Debug for HandlerDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDef")
            .field("name", &self.name)
            .field("handles", &self.handles)
            .finish()
    }
}

/// Registry resolving `event name -> fold function`
///
/// Invariant: at most one handler per event name.
#[derive(Clone, Default)]
pub struct HandlerRegistry<S> {
    handlers: HashMap<String, HandlerDef<S>>,
}

impl<S> HandlerRegistry<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Build a registry from a list of definitions, failing on duplicates
    pub fn from_defs(defs: impl IntoIterator<Item = HandlerDef<S>>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for def in defs {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Register a handler; fails with `DUPLICATE_HANDLER` if the event name
    /// is already taken
    pub fn register(&mut self, def: HandlerDef<S>) -> Result<(), RegistryError> {
        if let Some(existing) = self.handlers.get(&def.handles) {
            return Err(RegistryError::DuplicateHandler {
                event: def.handles.clone(),
                existing: existing.name.clone(),
                incoming: def.name.clone(),
            });
        }
        self.handlers.insert(def.handles.clone(), def);
        Ok(())
    }

    /// Resolve the handler for an event name; absence is normal
    pub fn get(&self, event_name: &str) -> Option<&HandlerDef<S>> {
        self.handlers.get(event_name)
    }

    pub fn has(&self, event_name: &str) -> bool {
        self.handlers.contains_key(event_name)
    }

    pub fn all(&self) -> impl Iterator<Item = &HandlerDef<S>> {
        self.handlers.values()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<S> std::fmt::Debug for HandlerRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
