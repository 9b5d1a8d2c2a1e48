//! MCP dispatch tests: JSON-RPC in, Amplitude calls against a mock server.

use std::sync::Arc;

use amplitude_mcp::api::AmplitudeClient;
use amplitude_mcp::config::{Config, Credentials};
use amplitude_mcp::mcp::http::create_router;
use amplitude_mcp::mcp::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use amplitude_mcp::mcp::McpServer;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn server_for(mock: &MockServer) -> McpServer {
    let config = Config::new(Credentials::new("k", "s").unwrap(), mock.uri());
    McpServer::new(AmplitudeClient::new(&config).unwrap())
}

async fn call(server: &McpServer, request: Value) -> Value {
    let response = server
        .handle_line(&request.to_string())
        .await
        .expect("expected a response");
    serde_json::to_value(response).unwrap()
}

fn tool_call(name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

fn content_text(response: &Value, index: usize) -> &str {
    response["result"]["content"][index]["text"].as_str().unwrap()
}

// ============================================================================
// Lifecycle and listing
// ============================================================================

#[tokio::test]
async fn test_initialize_and_ping() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let init = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}}),
    )
    .await;
    assert_eq!(init["id"], 0);
    assert_eq!(init["result"]["serverInfo"]["name"], "amplitude-mcp");
    assert!(init["result"]["capabilities"]["tools"].is_object());

    let ping = call(&server, json!({"jsonrpc": "2.0", "id": "p", "method": "ping"})).await;
    assert_eq!(ping["result"], json!({}));
}

#[tokio::test]
async fn test_tools_list_has_every_operation() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let response = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();

    assert_eq!(names.len(), 13);
    for expected in [
        "query_events",
        "export_events",
        "get_chart",
        "get_active_users",
        "get_event_segmentation",
        "analyze_funnel",
        "analyze_retention",
        "get_user_activity",
        "search_users",
        "list_events",
        "create_annotation",
        "list_annotations",
        "get_annotation",
    ] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    for tool in tools {
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[tokio::test]
async fn test_notification_gets_no_response() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let line = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
    assert!(server.handle_line(&line).await.is_none());
    assert!(server.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn test_malformed_line_is_parse_error() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let response = server.handle_line("{not json").await.unwrap();
    let response = serde_json::to_value(response).unwrap();
    assert_eq!(response["error"]["code"], PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_null_id_still_gets_a_response() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let response = call(&server, json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).await;
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["result"], json!({}));

    // An id makes it a request, whatever the method is called
    let response = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 9, "method": "notifications/initialized"}),
    )
    .await;
    assert_eq!(response["id"], 9);
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_json_that_is_not_a_request() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let response = call(&server, json!({"jsonrpc": "2.0", "id": 3})).await;
    assert_eq!(response["error"]["code"], INVALID_REQUEST);
    assert_eq!(response["id"], 3);
}

#[tokio::test]
async fn test_unknown_method_and_tool() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "prompts/list"});
    let response = call(&server, request).await;
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);

    let response = call(&server, tool_call("get_cohorts", json!({}))).await;
    assert_eq!(response["error"]["code"], INVALID_PARAMS);
}

// ============================================================================
// Tool calls
// ============================================================================

#[tokio::test]
async fn test_list_events_tool_success_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::path("/api/2/events/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"name": "Sign Up", "totals": 10}, {"name": "Purchase", "totals": 3}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let server = server_for(&mock_server);
    let response = call(&server, tool_call("list_events", json!({}))).await;

    assert!(response["result"].get("isError").is_none());
    assert_eq!(content_text(&response, 0), "2 event types");
    let data: Value = serde_json::from_str(content_text(&response, 1)).unwrap();
    assert_eq!(data["data"][1]["name"], "Purchase");
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_amplitude() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let server = server_for(&mock_server);
    let response = call(
        &server,
        tool_call(
            "get_active_users",
            json!({"start": "2024-01-01", "end": "20240107"}),
        ),
    )
    .await;

    assert_eq!(response["result"]["isError"], true);
    let text = content_text(&response, 0);
    assert!(text.starts_with("Error: Validation error: start"), "{}", text);

    let response = call(
        &server,
        tool_call(
            "analyze_funnel",
            json!({"events": ["{\"event_type\":\"A\"}"], "start": "20240101", "end": "20240107"}),
        ),
    )
    .await;
    assert_eq!(response["result"]["isError"], true);
}

#[tokio::test]
async fn test_export_tool_empty_range() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::path("/api/2/export"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let server = server_for(&mock_server);
    let response = call(
        &server,
        tool_call(
            "export_events",
            json!({"start": "20240101T00", "end": "20240101T23"}),
        ),
    )
    .await;

    assert!(response["result"].get("isError").is_none());
    let data: Value = serde_json::from_str(content_text(&response, 1)).unwrap();
    assert_eq!(data["total_records"], 0);
    assert_eq!(data["records"], json!([]));
}

#[tokio::test]
async fn test_api_failure_becomes_tool_error() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::path("/api/2/annotations"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden for this project"))
        .mount(&mock_server)
        .await;

    let server = server_for(&mock_server);
    let response = call(&server, tool_call("get_annotation", json!({"id": 5}))).await;

    // Tool failures are results, not JSON-RPC errors
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        content_text(&response, 0),
        "Error: API error: Forbidden for this project"
    );
}

// ============================================================================
// Resources
// ============================================================================

#[tokio::test]
async fn test_resource_listing() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"});
    let response = call(&server, request).await;
    let uris: Vec<&str> = response["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap())
        .collect();
    assert_eq!(uris, vec!["amplitude://events", "amplitude://annotations"]);

    let response = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 2, "method": "resources/templates/list"}),
    )
    .await;
    assert!(!response["result"]["resourceTemplates"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_resource_read_runs_the_operation() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::path("/api/2/useractivity"))
        .and(matchers::query_param("user", "12345"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userData": {"num_events": 2},
            "events": [{"event_type": "A"}, {"event_type": "B"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let server = server_for(&mock_server);
    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "resources/read",
            "params": {"uri": "amplitude://users/12345/activity"}
        }),
    )
    .await;

    let contents = &response["result"]["contents"][0];
    assert_eq!(contents["uri"], "amplitude://users/12345/activity");
    let data: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(data["events"][0]["event_type"], "A");
}

#[tokio::test]
async fn test_resource_read_decodes_encoded_user() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::path("/api/2/usersearch"))
        .and(matchers::query_param("user", "alice@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [{"amplitude_id": 42, "user_id": "alice@example.com"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let server = server_for(&mock_server);
    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "resources/read",
            "params": {"uri": "amplitude://users/search/alice%40example.com"}
        }),
    )
    .await;

    let text = response["result"]["contents"][0]["text"].as_str().unwrap();
    let data: Value = serde_json::from_str(text).unwrap();
    assert_eq!(data["matches"][0]["amplitude_id"], 42);

    let received = mock_server.received_requests().await.unwrap();
    let user: Vec<String> = received[0]
        .url
        .query_pairs()
        .filter(|(k, _)| k == "user")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(user, vec!["alice@example.com".to_string()]);
}

#[tokio::test]
async fn test_resource_read_bad_uri() {
    let mock_server = MockServer::start().await;
    let server = server_for(&mock_server);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "resources/read",
            "params": {"uri": "amplitude://cohorts"}
        }),
    )
    .await;
    assert_eq!(response["error"]["code"], INVALID_PARAMS);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "resources/read",
            "params": {"uri": "amplitude://export/2024/2025"}
        }),
    )
    .await;
    assert_eq!(response["error"]["code"], INVALID_PARAMS);
}

// ============================================================================
// HTTP transport
// ============================================================================

#[tokio::test]
async fn test_http_health() {
    let mock_server = MockServer::start().await;
    let app = create_router(Arc::new(server_for(&mock_server)));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_http_mcp_endpoint() {
    let mock_server = MockServer::start().await;
    let app = create_router(Arc::new(server_for(&mock_server)));

    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["id"], 7);
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 13);

    let notification = Request::builder()
        .method("POST")
        .uri("/mcp")
        .body(Body::from(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(notification).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}
