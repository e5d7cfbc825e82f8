//! Tagwright — an LLM-driven web analytics automation agent.
//!
//! The agent takes a natural-language task, plans with a language model,
//! and executes the work through four tools: creating GA4 event tags in
//! Google Tag Manager, capturing a page's network requests headlessly,
//! fetching GA4 reports with Excel export, and running JavaScript on web
//! pages. An HTTP gateway exposes the whole loop as one endpoint.

pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod tools;
