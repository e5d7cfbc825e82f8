//! End-to-end checks of the tool surface the model sees: the registry
//! schemas, dispatch through the toolbox, and the request bodies and reply
//! texts the tools produce.

use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tagwright::config::Config;
use tagwright::error::{render_outcome, ToolError};
use tagwright::tools::{self, ga4, gtm, network, Toolbox};

fn toolbox() -> Toolbox {
    Toolbox::new(reqwest::Client::new(), Arc::new(Config::default()))
}

// ── Registry ────────────────────────────────────────────────────────────────

#[test]
fn registry_exposes_the_four_analytics_tools() {
    let defs = tools::all_tools();
    assert_eq!(defs.len(), 4);

    let names: Vec<&str> = defs.iter().map(|t| t.name).collect();
    assert!(names.contains(&"run_a_js_code_on_a_web_page"));
    assert!(names.contains(&"create_a_gtm_ga4_event_tag"));
    assert!(names.contains(&"fetch_the_network_requests_on_page_load"));
    assert!(names.contains(&"get_a_ga4_report"));
}

#[test]
fn provider_schemas_cover_every_tool() {
    let anthropic = tools::tools_anthropic();
    let openai = tools::tools_openai();
    assert_eq!(anthropic.len(), 4);
    assert_eq!(openai.len(), 4);

    for tool in &anthropic {
        assert!(tool["input_schema"]["properties"].is_object());
        assert!(tool["input_schema"]["required"].is_array());
    }
    for tool in &openai {
        assert_eq!(tool["type"], "function");
        assert!(tool["function"]["parameters"]["properties"].is_object());
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_tool_name_yields_exception_text() {
    let reply = toolbox().execute("delete_all_tags", &json!({})).await;
    assert!(reply.starts_with("An exception occurred while using the tool!"));
    assert!(reply.contains("Unknown tool: delete_all_tags"));
    assert!(reply.ends_with("Stop here and respond with the exception summary."));
}

#[tokio::test]
async fn malformed_arguments_yield_exception_text() {
    // sleep_time is required and must be an integer.
    let reply = toolbox()
        .execute(
            "run_a_js_code_on_a_web_page",
            &json!({ "web_page": "https://example.com" }),
        )
        .await;
    assert!(reply.starts_with("An exception occurred while using the tool!"));
}

#[test]
fn outcome_rendering_round_trips_success() {
    assert_eq!(
        render_outcome(Ok("Congratulations!".to_string())),
        "Congratulations!"
    );
    let failure = render_outcome(Err(ToolError::Browser("launch failed".to_string())));
    assert!(failure.contains("launch failed"));
}

// ── GTM tag body ────────────────────────────────────────────────────────────

#[test]
fn gtm_tag_body_matches_api_contract() {
    let args = gtm::CreateTagArgs {
        account_id: "1".to_string(),
        container_id: "2".to_string(),
        workspace_id: "3".to_string(),
        name: "GA4 - sign_up".to_string(),
        ga4_event_name: "sign_up".to_string(),
        ga4_event_parameters: vec![HashMap::from([(
            "method".to_string(),
            "email".to_string(),
        )])],
        ga4_measurement_id: "G-XYZ".to_string(),
        trigger_ids: None,
        notes: None,
    };

    let body = gtm::build_tag_body(&args).unwrap();
    assert_eq!(body["type"], "gaawe");
    assert_eq!(body["tagFiringOption"], "oncePerEvent");

    let params = body["parameter"].as_array().unwrap();
    let ecommerce = params
        .iter()
        .find(|p| p["key"] == "sendEcommerceData")
        .unwrap();
    assert_eq!(ecommerce["type"], "boolean");
    assert_eq!(ecommerce["value"], "false");

    assert_eq!(
        gtm::tags_endpoint(&args),
        "https://tagmanager.googleapis.com/tagmanager/v2/accounts/1/containers/2/workspaces/3/tags"
    );
}

// ── GA4 report request ──────────────────────────────────────────────────────

#[test]
fn ga4_request_scopes_to_stream_and_caps_rows() {
    let args = ga4::Ga4ReportArgs {
        dimensions: vec!["date".to_string()],
        metrics: vec!["sessions".to_string()],
        date_ranges: vec![("2026-08-01".to_string(), "2026-08-28".to_string())],
        property_id: "111".to_string(),
        stream_id: "222".to_string(),
        dimension_regex_filters: BTreeMap::from([(
            "pagePath".to_string(),
            "/pricing.*".to_string(),
        )]),
        sort_by_metrics: Vec::new(),
        ascending_bools: Vec::new(),
    };

    let body = ga4::build_report_request(&args);
    assert_eq!(body["limit"], "250000");

    let expressions = body["dimensionFilter"]["andGroup"]["expressions"]
        .as_array()
        .unwrap();
    assert_eq!(expressions.len(), 2);
    assert_eq!(expressions[0]["filter"]["fieldName"], "streamID");
    assert_eq!(expressions[1]["filter"]["stringFilter"]["matchType"], "FULL_REGEXP");
}

#[test]
fn ga4_report_artifact_name_and_export() {
    use chrono::TimeZone;
    let at = chrono::Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let name = ga4::report_file_name("111", "222", at);
    assert_eq!(name, "111-222_report_02-01-2026 03-04-05.xlsx");

    let table = ga4::ReportTable {
        columns: vec!["date".to_string(), "sessions".to_string()],
        rows: vec![vec!["20260828".to_string(), "17".to_string()]],
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    table.write_xlsx(&path).unwrap();
    assert!(path.exists());
}

// ── Network capture formatting ──────────────────────────────────────────────

#[test]
fn network_listing_reports_decoded_analytics_hits() {
    let requests = vec![
        network::CapturedRequest {
            method: "GET".to_string(),
            url: "https://www.google-analytics.com/g/collect?v=2&en=page_view&dt=Pricing+Page"
                .to_string(),
            status: Some(204),
            post_data: None,
        },
        network::CapturedRequest {
            method: "GET".to_string(),
            url: "https://cdn.example.com/app.js".to_string(),
            status: Some(200),
            post_data: None,
        },
    ];
    let filter = regex::RegexBuilder::new("google-analytics")
        .case_insensitive(true)
        .build()
        .unwrap();

    let (count, details) = network::format_requests(&requests, &filter);
    assert_eq!(count, 1);
    assert!(details.starts_with("1. URL: https://www.google-analytics.com"));
    assert!(details.contains("dt=Pricing Page"));
    assert!(!details.contains("app.js"));
}
