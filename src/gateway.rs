//! HTTP entry point.
//!
//! Serves the invocation endpoint plus health and metrics routes. An
//! invocation always answers 200: agent failures are folded into the JSON
//! body so callers get a readable error instead of a bare status code.

use crate::agent::Agent;
use crate::metrics;
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use warp::Filter;

/// Prompt used when an invocation arrives without one.
pub const DEFAULT_PROMPT: &str = "Artificial Intelligence in Healthcare";

#[derive(Debug, Deserialize)]
pub struct InvocationPayload {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Fold an agent outcome into the invocation response body.
fn invocation_reply(outcome: Result<String>) -> Value {
    match outcome {
        Ok(result) => json!({ "result": result }),
        Err(e) => json!({ "error": format!("An error occurred: {e}") }),
    }
}

async fn handle_invocation(
    payload: InvocationPayload,
    agent: Arc<Agent>,
) -> std::result::Result<impl warp::Reply, Infallible> {
    let _timer = metrics::RequestTimer::new("invocation");
    let prompt = payload
        .prompt
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
    info!("handling invocation");

    let outcome = agent.run(&prompt).await;
    if let Err(ref e) = outcome {
        error!(error = %e, "invocation failed");
    }
    Ok(warp::reply::json(&invocation_reply(outcome)))
}

/// Run the gateway until cancelled.
pub async fn serve(agent: Arc<Agent>, addr: SocketAddr) {
    let agent_filter = warp::any().map(move || agent.clone());

    let invocations = warp::path("invocations")
        .and(warp::post())
        .and(warp::body::json())
        .and(agent_filter)
        .and_then(handle_invocation);

    let ping = warp::path("ping")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "healthy" })));

    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .map(metrics::render);

    let routes = invocations.or(ping).or(metrics_route);

    info!(%addr, "gateway listening");
    warp::serve(routes).run(addr).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_prompt_is_optional() {
        let payload: InvocationPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.prompt.is_none());

        let payload: InvocationPayload =
            serde_json::from_str(r#"{ "prompt": "audit the tags" }"#).unwrap();
        assert_eq!(payload.prompt.as_deref(), Some("audit the tags"));
    }

    #[test]
    fn test_success_reply_shape() {
        let body = invocation_reply(Ok("42 sessions last week".to_string()));
        assert_eq!(body["result"], "42 sessions last week");
        assert!(body.get("error").is_none());
    }

    #[test]
    fn test_error_reply_envelope() {
        let body = invocation_reply(Err(anyhow::anyhow!("provider unreachable")));
        assert_eq!(body["error"], "An error occurred: provider unreachable");
        assert!(body.get("result").is_none());
    }
}
