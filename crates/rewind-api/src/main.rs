// Rewind API server
//
// Wires a demo counter workflow behind the HTTP/SSE endpoint. The input
// string becomes the payload of the initial `workflow:started` event; when
// ANTHROPIC_API_KEY is set a summarizer agent reacts to it through the
// provider, and when REWIND_STORE_DIR is set runs can be recorded to disk.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rewind_anthropic::AnthropicProvider;
use rewind_api::{app, AppState, CorsConfig};
use rewind_core::{
    Agent, AgentRegistry, Event, Field, HandlerDef, HandlerOutput, HandlerRegistry, Schema,
};
use rewind_runtime::Workflow;
use rewind_storage::FileStore;

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
struct DemoState {
    count: i64,
    inputs: Vec<String>,
    summary: Option<String>,
}

fn demo_handlers() -> Result<HandlerRegistry<DemoState>> {
    let handlers = HandlerRegistry::from_defs([
        HandlerDef::new(
            "record-input",
            "workflow:started",
            |event: &Event, state: &DemoState| {
                let mut inputs = state.inputs.clone();
                if let Some(input) = event.payload["input"].as_str() {
                    inputs.push(input.to_string());
                }
                Ok(HandlerOutput::with_events(
                    DemoState {
                        inputs,
                        ..state.clone()
                    },
                    vec![Event::caused_by("count:incremented", json!({}), event.id)],
                ))
            },
        ),
        HandlerDef::new(
            "increment",
            "count:incremented",
            |_event: &Event, state: &DemoState| {
                Ok(HandlerOutput::state(DemoState {
                    count: state.count + 1,
                    ..state.clone()
                }))
            },
        ),
        HandlerDef::new(
            "store-summary",
            "summary:proposed",
            |event: &Event, state: &DemoState| {
                Ok(HandlerOutput::state(DemoState {
                    summary: event.payload["summary"].as_str().map(str::to_string),
                    ..state.clone()
                }))
            },
        ),
    ])?;
    Ok(handlers)
}

fn summarizer() -> Result<Agent<DemoState>> {
    let agent = Agent::builder("summarizer")
        .activates_on(["workflow:started"])
        .emits(["summary:proposed"])
        .output_schema(Schema::object([Field::required("summary", Schema::String)]))
        .prompt(|_state: &DemoState, event: &Event| {
            format!(
                "Summarize this workflow input in one sentence: {}",
                event.payload["input"].as_str().unwrap_or_default()
            )
        })
        .on_output(|output, event| {
            vec![Event::caused_by(
                "summary:proposed",
                json!({"summary": output["summary"]}),
                event.id,
            )]
        })
        .build()?;
    Ok(agent)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewind_api=debug,rewind_runtime=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("rewind-api starting");

    let mut workflow = Workflow::new(demo_handlers()?);

    if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
        let provider = AnthropicProvider::new(api_key);
        workflow = workflow
            .agents(AgentRegistry::from_agents([summarizer()?])?)
            .provider(Arc::new(provider));
        tracing::info!("Anthropic provider configured, summarizer agent enabled");
    } else {
        tracing::info!("ANTHROPIC_API_KEY not set, running without agents");
    }

    if let Ok(dir) = std::env::var("REWIND_STORE_DIR") {
        let store = FileStore::new(&dir)
            .await
            .with_context(|| format!("failed to open event store at {dir}"))?;
        workflow = workflow.store(Arc::new(store));
        tracing::info!(dir = %dir, "file event store configured");
    } else {
        tracing::info!("REWIND_STORE_DIR not set, recording disabled");
    }

    let state = AppState::new(workflow, |input: &str| {
        (
            Event::new("workflow:started", json!({"input": input})),
            DemoState::default(),
        )
    });

    let cors = CorsConfig::from_env();
    tracing::info!(cors = ?cors, "CORS configured");

    let router = app(state, &cors);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}
