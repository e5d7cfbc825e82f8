//! Agent tool system for Tagwright.
//!
//! Provides a registry of the web-analytics tools the language model can
//! invoke, formatters that serialise the tool definitions into each
//! provider's native schema (OpenAI function-calling, Anthropic tool-use),
//! and the `Toolbox` that executes a call and renders its outcome as text.

pub mod browser;
pub mod ga4;
pub mod gtm;
pub mod js;
pub mod network;

use crate::config::Config;
use crate::error::{render_outcome, ToolError};
use crate::metrics;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

// ── Tool definitions ────────────────────────────────────────────────────────

/// JSON-Schema-like parameter definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    /// JSON Schema type: "string", "integer", "boolean", "array", "object".
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
}

impl ToolParam {
    fn new(name: &str, description: &str, param_type: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type: param_type.to_string(),
            required,
        }
    }
}

/// A tool that the agent can invoke.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ToolParam>,
}

pub const RUN_JS_TOOL: &str = "run_a_js_code_on_a_web_page";
pub const CREATE_TAG_TOOL: &str = "create_a_gtm_ga4_event_tag";
pub const NETWORK_CAPTURE_TOOL: &str = "fetch_the_network_requests_on_page_load";
pub const GA4_REPORT_TOOL: &str = "get_a_ga4_report";

// ── Tool registry ───────────────────────────────────────────────────────────

/// Return all available tools.
pub fn all_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: RUN_JS_TOOL,
            description:
                "Load a web page in a headless browser, wait for it to settle, \
                 then run a JavaScript snippet on it and return the snippet's \
                 output. Use an explicit `return` statement in the snippet to \
                 capture a value; without one the output is null.",
            parameters: run_js_params(),
        },
        ToolDef {
            name: CREATE_TAG_TOOL,
            description:
                "Create a Google Analytics 4 event tag in a Google Tag Manager \
                 workspace. The tag fires the given GA4 event with the given \
                 event parameters, sending to the given measurement ID. Creation \
                 is the only action; the tag is not published.",
            parameters: create_tag_params(),
        },
        ToolDef {
            name: NETWORK_CAPTURE_TOOL,
            description:
                "Load a web page in a headless browser and capture every \
                 network/HTTP request made during page load. Returns the \
                 requests whose URL matches a case-insensitive regex filter, \
                 with method, response status, and decoded query string or body.",
            parameters: network_capture_params(),
        },
        ToolDef {
            name: GA4_REPORT_TOOL,
            description:
                "Run a Google Analytics 4 report for a property, always scoped \
                 to a single data stream. The full result is exported as an \
                 Excel file; reports with fewer than 50 rows are also returned \
                 inline. Dimension values can be narrowed with full-match regex \
                 filters, and rows can be sorted by metric columns.",
            parameters: ga4_report_params(),
        },
    ]
}

fn run_js_params() -> Vec<ToolParam> {
    vec![
        ToolParam::new("web_page", "Full URL of the web page to load.", "string", true),
        ToolParam::new(
            "sleep_time",
            "Seconds to wait after the page loads before running the code.",
            "integer",
            true,
        ),
        ToolParam::new(
            "js_code",
            "JavaScript code to run on the page. Use `return` to yield a value.",
            "string",
            true,
        ),
    ]
}

fn create_tag_params() -> Vec<ToolParam> {
    vec![
        ToolParam::new("account_id", "GTM account ID.", "string", true),
        ToolParam::new("container_id", "GTM container ID.", "string", true),
        ToolParam::new("workspace_id", "GTM workspace ID to create the tag in.", "string", true),
        ToolParam::new("name", "Display name for the new tag.", "string", true),
        ToolParam::new(
            "ga4_event_name",
            "Name of the GA4 event the tag sends.",
            "string",
            true,
        ),
        ToolParam::new(
            "ga4_event_parameters",
            "Event parameters as a list of single-entry objects, e.g. \
             [{\"page_title\": \"{{Page Title}}\"}, {\"currency\": \"EUR\"}].",
            "array",
            true,
        ),
        ToolParam::new(
            "ga4_measurement_id",
            "GA4 measurement ID the tag sends to (e.g. G-XXXXXXX).",
            "string",
            true,
        ),
        ToolParam::new(
            "trigger_ids",
            "IDs of existing triggers that fire the tag.",
            "array",
            false,
        ),
        ToolParam::new("notes", "Free-text notes stored on the tag.", "string", false),
    ]
}

fn network_capture_params() -> Vec<ToolParam> {
    vec![
        ToolParam::new("web_page", "Full URL of the web page to load.", "string", true),
        ToolParam::new(
            "sleep_time",
            "Seconds to keep capturing after the page loads.",
            "integer",
            true,
        ),
        ToolParam::new(
            "regex_filter_string",
            "Case-insensitive regex matched against each request URL. \
             Use e.g. 'google-analytics|collect' to focus on analytics hits.",
            "string",
            true,
        ),
    ]
}

fn ga4_report_params() -> Vec<ToolParam> {
    vec![
        ToolParam::new("dimensions", "GA4 dimension API names, e.g. [\"pagePath\"].", "array", true),
        ToolParam::new("metrics", "GA4 metric API names, e.g. [\"sessions\"].", "array", true),
        ToolParam::new(
            "date_ranges",
            "List of [start, end] date pairs formatted YYYY-MM-DD.",
            "array",
            true,
        ),
        ToolParam::new("property_id", "Numeric GA4 property ID.", "string", true),
        ToolParam::new(
            "stream_id",
            "Numeric GA4 data stream ID the report is scoped to.",
            "string",
            true,
        ),
        ToolParam::new(
            "dimension_regex_filters",
            "Object mapping a dimension name to a full-match regex, e.g. \
             {\"pagePath\": \"/blog/.*\"}.",
            "object",
            false,
        ),
        ToolParam::new(
            "sort_by_metrics",
            "Metric names to sort the report rows by, in priority order.",
            "array",
            false,
        ),
        ToolParam::new(
            "ascending_bools",
            "One boolean per sort metric; true for ascending. Defaults to \
             ascending for every metric.",
            "array",
            false,
        ),
    ]
}

// ── Provider-specific formatters ────────────────────────────────────────────

/// Parameters for a tool, building a JSON Schema `properties` / `required`.
fn params_to_json_schema(params: &[ToolParam]) -> (Value, Value) {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for p in params {
        let mut prop = serde_json::Map::new();
        prop.insert("type".into(), json!(p.param_type));
        prop.insert("description".into(), json!(p.description));
        properties.insert(p.name.clone(), Value::Object(prop));
        if p.required {
            required.push(json!(p.name));
        }
    }

    (Value::Object(properties), Value::Array(required))
}

/// OpenAI / OpenAI-compatible function-calling format.
///
/// ```json
/// { "type": "function", "function": { "name", "description", "parameters": { … } } }
/// ```
pub fn tools_openai() -> Vec<Value> {
    all_tools()
        .into_iter()
        .map(|t| {
            let (properties, required) = params_to_json_schema(&t.parameters);
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    }
                }
            })
        })
        .collect()
}

/// Anthropic tool-use format.
///
/// ```json
/// { "name", "description", "input_schema": { … } }
/// ```
pub fn tools_anthropic() -> Vec<Value> {
    all_tools()
        .into_iter()
        .map(|t| {
            let (properties, required) = params_to_json_schema(&t.parameters);
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            })
        })
        .collect()
}

// ── Tool execution ──────────────────────────────────────────────────────────

/// Executes tool calls with their shared dependencies injected once.
///
/// The browser tools launch their own Chromium per call; the Google API
/// tools share the HTTP client and read credentials and paths from the
/// configuration.
pub struct Toolbox {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl Toolbox {
    pub fn new(http: reqwest::Client, config: Arc<Config>) -> Self {
        Self { http, config }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Find a tool by name, execute it, and render its outcome as the text
    /// that goes back to the model. Errors never escape as `Err`; they are
    /// folded into the reply text so the model can react to them.
    pub async fn execute(&self, name: &str, args: &Value) -> String {
        let outcome = match name {
            RUN_JS_TOOL => js::exec(self, args).await,
            CREATE_TAG_TOOL => gtm::exec(self, args).await,
            NETWORK_CAPTURE_TOOL => network::exec(self, args).await,
            GA4_REPORT_TOOL => ga4::exec(self, args).await,
            other => Err(ToolError::InvalidArguments(format!("Unknown tool: {other}"))),
        };
        metrics::record_tool_call(name, outcome.is_ok());
        render_outcome(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_all_four_tools() {
        let names: Vec<&str> = all_tools().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                RUN_JS_TOOL,
                CREATE_TAG_TOOL,
                NETWORK_CAPTURE_TOOL,
                GA4_REPORT_TOOL,
            ]
        );
    }

    #[test]
    fn test_anthropic_schema_shape() {
        let tools = tools_anthropic();
        assert_eq!(tools.len(), 4);
        assert_eq!(tools[0]["name"], RUN_JS_TOOL);
        assert!(tools[0]["input_schema"]["properties"]["web_page"].is_object());
        let required = tools[0]["input_schema"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }

    #[test]
    fn test_openai_schema_shape() {
        let tools = tools_openai();
        assert_eq!(tools.len(), 4);
        assert_eq!(tools[1]["type"], "function");
        assert_eq!(tools[1]["function"]["name"], CREATE_TAG_TOOL);
        assert!(tools[1]["function"]["parameters"]["properties"]["ga4_event_name"].is_object());
    }

    #[test]
    fn test_optional_params_not_required() {
        let tools = tools_anthropic();
        let ga4 = tools
            .iter()
            .find(|t| t["name"] == GA4_REPORT_TOOL)
            .unwrap();
        let required = ga4["input_schema"]["required"].as_array().unwrap();
        let required: Vec<&str> = required.iter().map(|v| v.as_str().unwrap()).collect();
        assert!(required.contains(&"property_id"));
        assert!(!required.contains(&"sort_by_metrics"));
        assert!(!required.contains(&"dimension_regex_filters"));
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_exception() {
        let toolbox = Toolbox::new(
            reqwest::Client::new(),
            Arc::new(Config::default()),
        );
        let reply = toolbox.execute("no_such_tool", &json!({})).await;
        assert!(reply.starts_with("An exception occurred while using the tool!"));
        assert!(reply.contains("Unknown tool: no_such_tool"));
    }
}
