// Agent definitions, activation matching, and registry
//
// An agent reacts to declared event names (optionally gated by a state
// predicate), queries an LLM provider with a prompt derived from state and
// the triggering event, and translates validated structured output back into
// events.

use std::sync::Arc;

use serde_json::Value;

use crate::error::RegistryError;
use crate::event::Event;
use crate::schema::Schema;

/// Prompt builder: derives the provider prompt from state and the trigger
pub type PromptFn<S> = Arc<dyn Fn(&S, &Event) -> String + Send + Sync>;

/// Optional state guard evaluated before activation
pub type GuardFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// Output translator: turns validated provider output into follow-up events
pub type OnOutputFn = Arc<dyn Fn(&Value, &Event) -> Vec<Event> + Send + Sync>;

/// An LLM-backed unit of reaction on the event stream
#[derive(Clone)]
pub struct Agent<S> {
    pub name: String,
    /// Event names that activate this agent
    pub activates_on: Vec<String>,
    /// Event names this agent is expected to emit (documentation only)
    pub emits: Vec<String>,
    /// Optional model override passed through to the provider
    pub model: Option<String>,
    /// Validator for the provider's structured output
    pub output_schema: Schema,
    pub prompt: PromptFn<S>,
    pub when: Option<GuardFn<S>>,
    pub on_output: OnOutputFn,
}

impl<S> Agent<S> {
    pub fn builder(name: impl Into<String>) -> AgentBuilder<S> {
        AgentBuilder::new(name)
    }

    /// Whether this agent activates for the given event name and state
    ///
    /// An event-name mismatch always takes precedence: a passing guard cannot
    /// activate an agent on the wrong event.
    pub fn should_activate(&self, event_name: &str, state: &S) -> bool {
        if !self.activates_on.iter().any(|n| n == event_name) {
            return false;
        }
        match &self.when {
            Some(guard) => guard(state),
            None => true,
        }
    }
}

impl<S> std::fmt::Debug for Agent<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("activates_on", &self.activates_on)
            .field("emits", &self.emits)
            .field("model", &self.model)
            .finish()
    }
}

/// Builder for [`Agent`]
///
/// `build()` fails fast with `MissingOutputSchema` when no output schema was
/// provided.
pub struct AgentBuilder<S> {
    name: String,
    activates_on: Vec<String>,
    emits: Vec<String>,
    model: Option<String>,
    output_schema: Option<Schema>,
    prompt: Option<PromptFn<S>>,
    when: Option<GuardFn<S>>,
    on_output: Option<OnOutputFn>,
}

impl<S> AgentBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activates_on: Vec::new(),
            emits: Vec::new(),
            model: None,
            output_schema: None,
            prompt: None,
            when: None,
            on_output: None,
        }
    }

    pub fn activates_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.activates_on = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn emits(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.emits = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn prompt(mut self, prompt: impl Fn(&S, &Event) -> String + Send + Sync + 'static) -> Self {
        self.prompt = Some(Arc::new(prompt));
        self
    }

    pub fn when(mut self, guard: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.when = Some(Arc::new(guard));
        self
    }

    pub fn on_output(
        mut self,
        on_output: impl Fn(&Value, &Event) -> Vec<Event> + Send + Sync + 'static,
    ) -> Self {
        self.on_output = Some(Arc::new(on_output));
        self
    }

    pub fn build(self) -> Result<Agent<S>, RegistryError> {
        let output_schema = self
            .output_schema
            .ok_or_else(|| RegistryError::MissingOutputSchema(self.name.clone()))?;

        let name = self.name;
        let prompt = self
            .prompt
            .unwrap_or_else(|| Arc::new(|_state: &S, event: &Event| event.name.clone()));
        let on_output = self
            .on_output
            .unwrap_or_else(|| Arc::new(|_output: &Value, _event: &Event| Vec::new()));

        Ok(Agent {
            name,
            activates_on: self.activates_on,
            emits: self.emits,
            model: self.model,
            output_schema,
            prompt,
            when: self.when,
            on_output,
        })
    }
}

/// Name-keyed agent collection preserving registration order
#[derive(Clone, Default)]
pub struct AgentRegistry<S> {
    agents: Vec<Agent<S>>,
}

impl<S> AgentRegistry<S> {
    pub fn new() -> Self {
        Self { agents: Vec::new() }
    }

    /// Build a registry from agents, failing on duplicate names
    pub fn from_agents(agents: impl IntoIterator<Item = Agent<S>>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for agent in agents {
            registry.register(agent)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, agent: Agent<S>) -> Result<(), RegistryError> {
        if self.agents.iter().any(|a| a.name == agent.name) {
            return Err(RegistryError::DuplicateAgent(agent.name));
        }
        self.agents.push(agent);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Agent<S>> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Every agent that activates for this event, in registration order
    pub fn matching(&self, event_name: &str, state: &S) -> Vec<&Agent<S>> {
        self.agents
            .iter()
            .filter(|a| a.should_activate(event_name, state))
            .collect()
    }

    pub fn all(&self) -> &[Agent<S>] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl<S> std::fmt::Debug for AgentRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field(
                "agents",
                &self.agents.iter().map(|a| &a.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
