//! Integration tests for the render server HTTP API.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{FakeBrowser, TestServer, FAKE_PNG};
use studio_core::protocol::{CAPTURE_PATH, GENERATE_PATH, READINESS_HEADER, TARGET_HEADER, TEST_PATH};
use studio_core::render::RENDER_ROUTE;
use studio_server::UnavailableBrowser;

const DOCUMENT: &str = r#"<!DOCTYPE html><html><body><div id="root"><div id="render-canvas"></div></div><script>var sentinel = {}; sentinel.id = 'render-ready';</script></body></html>"#;

fn header<'a>(resp: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

async fn generate(server: &TestServer, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(server.url(GENERATE_PATH))
        .json(&body)
        .send()
        .await
        .expect("request")
}

async fn capture(server: &TestServer, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(server.url(CAPTURE_PATH))
        .json(&body)
        .send()
        .await
        .expect("request")
}

// ==========================================================================
// /api/test
// ==========================================================================

#[tokio::test]
async fn test_api_test_reports_browser_and_timestamp() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(Some(1)))).await;

    let resp = reqwest::get(server.url(TEST_PATH)).await.expect("request");
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["chrome"], true);
    let timestamp = body["timestamp"].as_str().expect("timestamp");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

    server.shutdown().await;
}

// ==========================================================================
// /api/generate-component and /render
// ==========================================================================

#[tokio::test]
async fn test_generate_writes_document_served_on_render_route() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(Some(1)))).await;

    let resp = generate(&server, json!({"code": DOCUMENT})).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "render.html generated successfully");

    let on_disk = std::fs::read_to_string(server.render_dir().join("render.html")).expect("file");
    assert_eq!(on_disk, DOCUMENT);

    let resp = reqwest::get(server.url(RENDER_ROUTE)).await.expect("request");
    assert_eq!(resp.status(), 200);
    assert!(header(&resp, "content-type").is_some_and(|ct| ct.starts_with("text/html")));
    assert_eq!(resp.text().await.expect("text"), DOCUMENT);

    server.shutdown().await;
}

#[tokio::test]
async fn test_render_route_follows_last_generated_file() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(Some(1)))).await;

    generate(&server, json!({"code": "<p>first</p>"})).await;
    generate(&server, json!({"code": "<p>second</p>", "filename": "other.html"})).await;

    let text = reqwest::get(server.url(RENDER_ROUTE))
        .await
        .expect("request")
        .text()
        .await
        .expect("text");
    assert_eq!(text, "<p>second</p>");

    server.shutdown().await;
}

#[tokio::test]
async fn test_generate_rejects_missing_code() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(Some(1)))).await;

    let resp = generate(&server, json!({"filename": "x.html"})).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body, json!({"error": "Code content is required"}));

    server.shutdown().await;
}

#[tokio::test]
async fn test_generate_rejects_path_traversal() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(Some(1)))).await;

    let resp = generate(&server, json!({"code": "x", "filename": "../../etc/passwd"})).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["error"], "Invalid filename");
    assert!(std::fs::read_dir(server.render_dir()).expect("dir").next().is_none());

    server.shutdown().await;
}

// ==========================================================================
// /api/capture-screenshot
// ==========================================================================

#[tokio::test]
async fn test_capture_returns_png_of_ready_canvas() {
    let browser = Arc::new(FakeBrowser::new(Some(2)));
    let server = TestServer::start(browser.clone()).await;
    generate(&server, json!({"code": DOCUMENT})).await;

    let resp = capture(
        &server,
        json!({"canvasId": "render-canvas", "viewport": {"width": 1024, "height": 300}}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(header(&resp, "content-type"), Some("image/png"));
    assert_eq!(header(&resp, "cache-control"), Some("no-cache"));
    assert_eq!(header(&resp, READINESS_HEADER), Some("ready"));
    assert_eq!(header(&resp, TARGET_HEADER), Some("element"));
    assert_eq!(resp.bytes().await.expect("bytes").as_ref(), FAKE_PNG);

    let opened = browser.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].0.ends_with(RENDER_ROUTE));
    assert_eq!(opened[0].1.width, 1024);
    assert_eq!(opened[0].1.height, 600);

    server.shutdown().await;
}

#[tokio::test]
async fn test_capture_proceeds_when_readiness_times_out() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(None))).await;
    generate(&server, json!({"code": DOCUMENT})).await;

    let resp = capture(&server, json!({})).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(header(&resp, READINESS_HEADER), Some("timed-out"));
    assert_eq!(header(&resp, TARGET_HEADER), Some("element"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_capture_falls_back_to_viewport_for_missing_node() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(Some(1)))).await;
    generate(&server, json!({"code": DOCUMENT})).await;

    let resp = capture(&server, json!({"canvasId": "not-there"})).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(header(&resp, READINESS_HEADER), Some("timed-out"));
    assert_eq!(header(&resp, TARGET_HEADER), Some("viewport"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_capture_before_generate_reports_navigation_failure() {
    let server = TestServer::start(Arc::new(FakeBrowser::new(Some(1)))).await;

    let resp = capture(&server, json!({})).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["error"], "Screenshot capture failed");
    assert!(body["details"]
        .as_str()
        .is_some_and(|d| d.starts_with("Frontend not accessible")));

    server.shutdown().await;
}

#[tokio::test]
async fn test_capture_error_stack_is_opt_in() {
    let server = TestServer::start_with(Arc::new(UnavailableBrowser), |settings| {
        settings.expose_error_stack = true;
    })
    .await;

    let resp = capture(&server, json!({})).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["details"], "Chrome browser not found");
    assert_eq!(body["stack"], "Chrome browser not found");

    server.shutdown().await;
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let server = TestServer::start(Arc::new(UnavailableBrowser)).await;

    let resp = reqwest::Client::new()
        .get(server.url(TEST_PATH))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .expect("request");
    assert_eq!(header(&resp, "x-request-id"), Some("abc-123"));
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["chrome"], false);

    server.shutdown().await;
}
