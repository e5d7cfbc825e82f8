//! Network request capture tool.
//!
//! Loads a page headlessly with the CDP network domain enabled, waits the
//! requested duration, then reports every captured request whose URL matches
//! a case-insensitive regex filter.

use crate::error::ToolError;
use crate::tools::browser::BrowserSession;
use crate::tools::Toolbox;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, RequestId,
};
use futures_util::StreamExt;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkCaptureArgs {
    pub web_page: String,
    pub sleep_time: u64,
    pub regex_filter_string: String,
}

/// One HTTP request observed during page load.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub status: Option<i64>,
    pub post_data: Option<String>,
}

/// Decode a URL component the way a human reads it: `+` as space, then
/// percent-unescaping. Falls back to the raw text on invalid escapes.
pub fn decode_component(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

/// Filter captured requests by regex (matched against the full raw URL) and
/// render the numbered detail listing.
///
/// GET requests report their decoded query string, or the literal
/// "No Query String Parameters" when absent. Everything else reports the
/// decoded body, or "No Parameters/Empty Body".
pub fn format_requests(requests: &[CapturedRequest], filter: &Regex) -> (usize, String) {
    let matching: Vec<&CapturedRequest> = requests
        .iter()
        .filter(|r| filter.is_match(&r.url))
        .collect();

    let mut output = String::new();
    for (i, request) in matching.iter().enumerate() {
        let status = request
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        output.push_str(&format!(
            "{}. URL: {}\n\ta. Method: {}\n\tb. Response Status Code: {}\n\t",
            i + 1,
            decode_component(&request.url),
            request.method,
            status,
        ));

        if request.method == "GET" {
            let query = match request.url.split_once('?') {
                Some((_, q)) if !q.is_empty() => decode_component(q),
                _ => "No Query String Parameters".to_string(),
            };
            output.push_str(&format!("c. Query String Parameters:\n\t\t{query}\n\n"));
        } else {
            let body = match request.post_data.as_deref() {
                Some(b) if !b.is_empty() => decode_component(b),
                _ => "No Parameters/Empty Body".to_string(),
            };
            output.push_str(&format!("c. Body:\n\t\t{body}\n\n"));
        }
    }

    (matching.len(), output)
}

pub(crate) async fn exec(toolbox: &Toolbox, args: &Value) -> Result<String, ToolError> {
    let args: NetworkCaptureArgs = serde_json::from_value(args.clone())
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    let filter = RegexBuilder::new(&args.regex_filter_string)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            ToolError::InvalidArguments(format!(
                "invalid regex filter '{}': {e}",
                args.regex_filter_string
            ))
        })?;

    let session = BrowserSession::launch(&toolbox.config().chrome).await?;
    let outcome = capture_requests(&session, &args).await;
    session.close().await;

    let requests = outcome?;
    let (count, details) = format_requests(&requests, &filter);

    Ok(format!(
        "Congratulations! The tool ran successfully.\n\n\
         Total network/HTTP requests with regex filter ({}) are {}. \
         You can see the details of all these requests here: {}. \
         Stop here and convey accordingly.",
        args.regex_filter_string, count, details,
    ))
}

async fn capture_requests(
    session: &BrowserSession,
    args: &NetworkCaptureArgs,
) -> Result<Vec<CapturedRequest>, ToolError> {
    let page = session.page();

    page.execute(EnableParams::default())
        .await
        .map_err(|e| ToolError::Browser(format!("failed to enable network domain: {e}")))?;

    let mut request_events = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| ToolError::Browser(format!("failed to subscribe to request events: {e}")))?;
    let mut response_events = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| ToolError::Browser(format!("failed to subscribe to response events: {e}")))?;

    let sent: Arc<Mutex<Vec<(RequestId, String, String, Option<String>)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let statuses: Arc<Mutex<HashMap<RequestId, i64>>> = Arc::new(Mutex::new(HashMap::new()));

    let sent_writer = sent.clone();
    let request_task = tokio::spawn(async move {
        while let Some(event) = request_events.next().await {
            let mut entries = sent_writer.lock().expect("request capture lock poisoned");
            entries.push((
                event.request_id.clone(),
                event.request.method.clone(),
                event.request.url.clone(),
                event.request.post_data_entries.as_ref().map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.bytes.as_ref())
                        .map(|bytes| {
                            let encoded: &str = bytes.as_ref();
                            STANDARD
                                .decode(encoded)
                                .map(|raw| String::from_utf8_lossy(&raw).into_owned())
                                .unwrap_or_else(|_| encoded.to_string())
                        })
                        .collect::<String>()
                }),
            ));
        }
    });

    let status_writer = statuses.clone();
    let response_task = tokio::spawn(async move {
        while let Some(event) = response_events.next().await {
            let mut entries = status_writer.lock().expect("response capture lock poisoned");
            entries.insert(event.request_id.clone(), event.response.status);
        }
    });

    let navigation = session.goto(&args.web_page).await;
    if navigation.is_ok() {
        tokio::time::sleep(Duration::from_secs(args.sleep_time)).await;
    }
    request_task.abort();
    response_task.abort();
    navigation?;

    let statuses = statuses.lock().expect("response capture lock poisoned");
    let requests = sent
        .lock()
        .expect("request capture lock poisoned")
        .iter()
        .map(|(id, method, url, post_data)| CapturedRequest {
            method: method.clone(),
            url: url.clone(),
            status: statuses.get(id).copied(),
            post_data: post_data.clone(),
        })
        .collect();

    Ok(requests)
}
