// Renderer contract
//
// Renderers are best-effort observers of the event stream, used for
// presentation and logging only. The runtime dispatches to them
// fire-and-forget: invocation never blocks the loop and errors are swallowed.

use async_trait::async_trait;

use rewind_core::Event;

/// A non-blocking, best-effort observer of the event stream
#[async_trait]
pub trait Renderer<S>: Send + Sync {
    /// Renderer name, used in diagnostics only
    fn name(&self) -> &str;

    /// Glob filters selecting which events this renderer sees
    fn patterns(&self) -> &[String];

    /// Render one event against the state it was folded into
    ///
    /// Errors are logged at debug level and otherwise ignored.
    async fn render(&self, event: &Event, state: &S) -> anyhow::Result<()>;
}

/// Renderer that logs matching events through `tracing`
///
/// Useful as a development default and as a template for UI-backed
/// renderers.
pub struct TracingRenderer {
    name: String,
    patterns: Vec<String>,
}

impl TracingRenderer {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: "tracing".to_string(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> Renderer<S> for TracingRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn patterns(&self) -> &[String] {
        &self.patterns
    }

    async fn render(&self, event: &Event, _state: &S) -> anyhow::Result<()> {
        tracing::info!(
            event_id = %event.id,
            event_name = %event.name,
            "event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_tracing_renderer_renders() {
        let renderer = TracingRenderer::new(["*"]);
        let event = Event::new("task:created", json!({}));
        assert!(Renderer::<()>::render(&renderer, &event, &()).await.is_ok());
        assert_eq!(Renderer::<()>::patterns(&renderer), ["*"]);
        assert_eq!(Renderer::<()>::name(&renderer), "tracing");
    }
}
