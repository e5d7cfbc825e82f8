//! The tool-using agent loop.
//!
//! One invocation is one conversation: the user's task goes to the model
//! together with the tool definitions, tool calls are executed locally and
//! their text results fed back, and the loop ends when the model answers
//! without requesting a tool (or the round limit is hit).

use crate::config::Config;
use crate::metrics;
use crate::tools::{self, Toolbox};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on model round trips per invocation.
const MAX_TOOL_ROUNDS: usize = 16;

const SYSTEM_PROMPT: &str = "\
You are a senior web analytics specialist. You execute web analytics tasks \
using the tools available to you: creating GA4 event tags in Google Tag \
Manager, capturing the network requests a web page makes on load, fetching \
GA4 reports, and running JavaScript code on web pages. Use the tools to do \
the work; do not guess at data you can fetch. When a tool reports an \
exception, stop and summarise the exception instead of retrying.";

/// A parsed tool call from the model.
#[derive(Debug, Clone)]
struct ParsedToolCall {
    id: String,
    name: String,
    arguments: Value,
}

/// A complete model response: optional text + optional tool calls.
#[derive(Debug, Default)]
struct ModelResponse {
    text: String,
    tool_calls: Vec<ParsedToolCall>,
}

/// Append the current date so relative date references in the task
/// ("last week", "yesterday") resolve correctly.
fn format_user_prompt(prompt: &str, now: DateTime<Local>) -> String {
    format!("{prompt}\n\nCurrent date: {}", now.format("%d/%m/%Y"))
}

pub struct Agent {
    http: reqwest::Client,
    config: Arc<Config>,
    toolbox: Arc<Toolbox>,
}

impl Agent {
    pub fn new(http: reqwest::Client, config: Arc<Config>, toolbox: Arc<Toolbox>) -> Self {
        Self {
            http,
            config,
            toolbox,
        }
    }

    /// Run one task to completion and return the model's final answer.
    pub async fn run(&self, prompt: &str) -> Result<String> {
        let user_prompt = format_user_prompt(prompt, Local::now());
        info!(provider = %self.config.provider, "starting invocation");

        if self.config.provider == "anthropic" {
            self.run_anthropic(&user_prompt).await
        } else {
            self.run_openai(&user_prompt).await
        }
    }

    // ── Anthropic ───────────────────────────────────────────────────────────

    async fn run_anthropic(&self, user_prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1/messages",
            self.config.resolved_base_url().trim_end_matches('/')
        );
        let api_key = self
            .config
            .api_key()
            .context("ANTHROPIC_API_KEY is not set")?;

        let mut messages = vec![json!({ "role": "user", "content": user_prompt })];

        for round in 0..MAX_TOOL_ROUNDS {
            let body = json!({
                "model": self.config.model,
                "max_tokens": 4096,
                "system": SYSTEM_PROMPT,
                "messages": messages,
                "tools": tools::tools_anthropic(),
            });

            let resp = self
                .http
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await
                .context("HTTP request to Anthropic failed")?;

            metrics::record_provider_request("anthropic", resp.status().is_success());
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                anyhow::bail!("Anthropic returned {} — {}", status, text);
            }

            let data: Value = resp.json().await.context("Invalid JSON from Anthropic")?;
            let model_resp = parse_anthropic_response(&data);

            if model_resp.tool_calls.is_empty() {
                return Ok(model_resp.text);
            }

            debug!(round, tools = model_resp.tool_calls.len(), "executing tool round");

            // Assistant turn with content blocks, then one user turn with
            // the tool_result blocks.
            let mut content_blocks = Vec::new();
            if !model_resp.text.is_empty() {
                content_blocks.push(json!({ "type": "text", "text": model_resp.text }));
            }
            for tc in &model_resp.tool_calls {
                content_blocks.push(json!({
                    "type": "tool_use",
                    "id": tc.id,
                    "name": tc.name,
                    "input": tc.arguments,
                }));
            }
            messages.push(json!({ "role": "assistant", "content": content_blocks }));

            let mut result_blocks = Vec::new();
            for tc in &model_resp.tool_calls {
                info!(tool = %tc.name, "executing tool");
                let output = self.toolbox.execute(&tc.name, &tc.arguments).await;
                result_blocks.push(json!({
                    "type": "tool_result",
                    "tool_use_id": tc.id,
                    "content": output,
                }));
            }
            messages.push(json!({ "role": "user", "content": result_blocks }));
        }

        anyhow::bail!("Tool loop limit reached — stopping.")
    }

    // ── OpenAI-compatible ───────────────────────────────────────────────────

    async fn run_openai(&self, user_prompt: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.resolved_base_url().trim_end_matches('/')
        );
        let api_key = self.config.api_key().unwrap_or_default();

        let mut messages = vec![
            json!({ "role": "system", "content": SYSTEM_PROMPT }),
            json!({ "role": "user", "content": user_prompt }),
        ];

        for round in 0..MAX_TOOL_ROUNDS {
            let body = json!({
                "model": self.config.model,
                "messages": messages,
                "tools": tools::tools_openai(),
            });

            let resp = self
                .http
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await
                .context("HTTP request to provider failed")?;

            metrics::record_provider_request(&self.config.provider, resp.status().is_success());
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                anyhow::bail!("Provider returned {} — {}", status, text);
            }

            let data: Value = resp.json().await.context("Invalid JSON from provider")?;
            let message = data["choices"][0]["message"].clone();
            let model_resp = parse_openai_message(&message);

            if model_resp.tool_calls.is_empty() {
                return Ok(model_resp.text);
            }

            debug!(round, tools = model_resp.tool_calls.len(), "executing tool round");

            // Assistant message carries the tool_calls verbatim, then one
            // "tool" message per result.
            messages.push(message);
            for tc in &model_resp.tool_calls {
                info!(tool = %tc.name, "executing tool");
                let output = self.toolbox.execute(&tc.name, &tc.arguments).await;
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": tc.id,
                    "content": output,
                }));
            }
        }

        anyhow::bail!("Tool loop limit reached — stopping.")
    }
}

// ── Response parsing ────────────────────────────────────────────────────────

fn parse_anthropic_response(data: &Value) -> ModelResponse {
    let mut result = ModelResponse::default();

    if let Some(content) = data["content"].as_array() {
        for block in content {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        if !result.text.is_empty() {
                            result.text.push('\n');
                        }
                        result.text.push_str(text);
                    }
                }
                Some("tool_use") => {
                    result.tool_calls.push(ParsedToolCall {
                        id: block["id"].as_str().unwrap_or("").to_string(),
                        name: block["name"].as_str().unwrap_or("").to_string(),
                        arguments: block["input"].clone(),
                    });
                }
                _ => {}
            }
        }
    }

    result
}

fn parse_openai_message(message: &Value) -> ModelResponse {
    let mut result = ModelResponse::default();

    if let Some(text) = message["content"].as_str() {
        result.text = text.to_string();
    }
    if let Some(tool_calls) = message["tool_calls"].as_array() {
        for tc in tool_calls {
            // Arguments arrive as a JSON string.
            let arguments = tc["function"]["arguments"]
                .as_str()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_else(|| json!({}));
            result.tool_calls.push(ParsedToolCall {
                id: tc["id"].as_str().unwrap_or("").to_string(),
                name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                arguments,
            });
        }
    }

    result
}
