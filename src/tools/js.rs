//! JS execution tool.
//!
//! Loads a page, waits, then evaluates a caller-supplied snippet. The
//! snippet is wrapped in an IIFE so an explicit `return` statement yields
//! the captured value; a snippet without `return` produces null output,
//! which is not an error.

use crate::error::ToolError;
use crate::tools::browser::BrowserSession;
use crate::tools::Toolbox;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct RunJsArgs {
    pub web_page: String,
    pub sleep_time: u64,
    pub js_code: String,
}

/// Wrap a statement-style snippet so it can be evaluated as an expression.
pub fn wrap_snippet(js_code: &str) -> String {
    format!("(function() {{ {js_code} }})()")
}

/// Render an evaluation result the way a person would read it: strings
/// bare, everything else as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) async fn exec(toolbox: &Toolbox, args: &Value) -> Result<String, ToolError> {
    let args: RunJsArgs = serde_json::from_value(args.clone())
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    let session = BrowserSession::launch(&toolbox.config().chrome).await?;
    let outcome = run_on_page(&session, &args).await;
    session.close().await;

    let value = outcome?;
    Ok(format!(
        "Congratulations! The tool ran successfully.\n\nHere is the JS code output:\n{}",
        render_value(&value),
    ))
}

async fn run_on_page(session: &BrowserSession, args: &RunJsArgs) -> Result<Value, ToolError> {
    session.goto(&args.web_page).await?;
    tokio::time::sleep(Duration::from_secs(args.sleep_time)).await;
    session.evaluate(&wrap_snippet(&args.js_code)).await
}
