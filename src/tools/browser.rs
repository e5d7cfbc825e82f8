//! Per-call headless browser session (CDP via chromiumoxide).
//!
//! Every browser-based tool acquires its own Chromium process for the
//! duration of one call and releases it on every exit path. Nothing is
//! shared between calls.

use crate::config::ChromeConfig;
use crate::error::ToolError;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Injected before every document load to mask automation fingerprinting.
const MASK_WEBDRIVER_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// One headless browser with a single page, owned by one tool call.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_handle: JoinHandle<()>,
    page_load_timeout: Duration,
}

impl BrowserSession {
    /// Launch a fresh headless browser and open a blank page.
    ///
    /// The fingerprint-masking script is registered before any navigation
    /// so it applies to every document the page loads.
    pub async fn launch(cfg: &ChromeConfig) -> Result<Self, ToolError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--incognito")
            .arg("--lang=en")
            .arg(format!("--user-agent={}", cfg.user_agent));

        for extra in &cfg.extra_args {
            builder = builder.arg(extra);
        }
        if let Some(ref exe) = cfg.executable {
            builder = builder.chrome_executable(exe);
        }

        let config = builder.build().map_err(ToolError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ToolError::Browser(format!("failed to launch browser: {e}")))?;

        // The handler stream must be drained for the browser to function.
        let handler_handle = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let session_setup = async {
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| ToolError::Browser(format!("failed to open page: {e}")))?;

            let mask = AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(MASK_WEBDRIVER_JS)
                .build()
                .map_err(ToolError::Browser)?;
            page.execute(mask)
                .await
                .map_err(|e| ToolError::Browser(format!("failed to inject init script: {e}")))?;

            Ok::<Page, ToolError>(page)
        };

        match session_setup.await {
            Ok(page) => Ok(Self {
                browser,
                page,
                handler_handle,
                page_load_timeout: Duration::from_secs(cfg.page_load_timeout_secs),
            }),
            Err(e) => {
                // Launch succeeded but setup failed: still tear down.
                let mut browser = browser;
                let _ = browser.close().await;
                handler_handle.abort();
                Err(e)
            }
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate the session's page, bounded by the fixed page-load timeout.
    pub async fn goto(&self, url: &str) -> Result<(), ToolError> {
        match tokio::time::timeout(self.page_load_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ToolError::Browser(format!("navigation to '{url}' failed: {e}"))),
            Err(_) => Err(ToolError::Browser(format!(
                "page load timed out after {}s: {url}",
                self.page_load_timeout.as_secs()
            ))),
        }
    }

    /// Evaluate a JavaScript expression on the current page.
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, ToolError> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| ToolError::Browser(format!("script evaluation failed: {e}")))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Shut the browser down. Called on every exit path of a tool.
    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        self.handler_handle.abort();
    }
}
