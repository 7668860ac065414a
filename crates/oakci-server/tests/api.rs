//! API integration tests over the in-process router.

mod utils;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use oakci_domain::value_objects::{CiConfig, GovernanceRule};
use serde_json::json;

use utils::{dispatch, get, get_auth, post, test_app, test_app_with};

#[tokio::test]
async fn health_reports_version_and_uptime() {
    let app = test_app().await;
    let response = get(&app.router, "/api/health").await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["oak_version"], oakci_domain::constants::VERSION);
    assert!(body["schema_version"].as_i64().unwrap_or(0) > 0);
}

#[tokio::test]
async fn status_includes_version_and_index_blocks() {
    let app = test_app().await;
    let response = get(&app.router, "/api/status").await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["version"]["update_available"], false);
    assert!(body["index_stats"].is_object());
    assert!(body["embedding_stats"]["providers"].is_array());
    assert!(body["storage"]["sqlite_size_bytes"].is_number());
}

// ----- auth -----

#[tokio::test]
async fn auth_exempts_get_health_only() {
    let app = test_app_with(CiConfig::default(), Some("secret-token".to_owned())).await;

    assert_eq!(
        get(&app.router, "/api/health").await.status,
        StatusCode::OK
    );
    // POST to the same path is not exempt.
    let response = post(&app.router, "/api/health", "{}").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_rejects_missing_invalid_scheme_and_wrong_token() {
    let app = test_app_with(CiConfig::default(), Some("secret-token".to_owned())).await;

    let missing = get(&app.router, "/api/status").await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json()["detail"], "missing");

    let request = Request::builder()
        .method("GET")
        .uri("/api/status")
        .header("Authorization", "Basic secret-token")
        .body(Body::empty())
        .expect("request");
    let bad_scheme = dispatch(&app.router, request).await;
    assert_eq!(bad_scheme.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad_scheme.json()["detail"], "invalid scheme");

    let wrong = get_auth(&app.router, "/api/status", "not-the-token").await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json()["detail"], "invalid token");

    let ok = get_auth(&app.router, "/api/status", "secret-token").await;
    assert_eq!(ok.status, StatusCode::OK);
}

// ----- body size limit -----

#[tokio::test]
async fn body_at_cap_passes_one_byte_over_fails() {
    let mut config = CiConfig::default();
    config.server.max_request_body_bytes = 64;
    let app = test_app_with(config, None).await;

    let at_cap = Request::builder()
        .method("POST")
        .uri("/api/fetch")
        .header("Content-Type", "application/json")
        .header("Content-Length", "64")
        .body(Body::from(" ".repeat(64)))
        .expect("request");
    let response = dispatch(&app.router, at_cap).await;
    assert_ne!(response.status, StatusCode::PAYLOAD_TOO_LARGE);

    let over = Request::builder()
        .method("POST")
        .uri("/api/fetch")
        .header("Content-Type", "application/json")
        .header("Content-Length", "65")
        .body(Body::from(" ".repeat(65)))
        .expect("request");
    let response = dispatch(&app.router, over).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}

// ----- CORS -----

#[tokio::test]
async fn cors_preflight_and_dynamic_origins() {
    let app = test_app().await;

    // Configured localhost origin gets the preflight answer.
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/search")
        .header("Origin", "http://localhost:8765")
        .body(Body::empty())
        .expect("request");
    let response = dispatch(&app.router, preflight).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response
            .headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:8765")
    );
    assert_eq!(
        response.headers.get("vary").and_then(|v| v.to_str().ok()),
        Some("Origin")
    );

    // Unknown origin: passthrough without CORS headers.
    let request = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("Origin", "https://evil.example")
        .body(Body::empty())
        .expect("request");
    let response = dispatch(&app.router, request).await;
    assert!(response.headers.get("access-control-allow-origin").is_none());

    // Tunnel URLs join the allowed set at runtime.
    app.state.add_cors_origin("https://abc.ngrok.io");
    let request = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("Origin", "https://abc.ngrok.io")
        .body(Body::empty())
        .expect("request");
    let response = dispatch(&app.router, request).await;
    assert_eq!(
        response
            .headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://abc.ngrok.io")
    );
}

// ----- search / fetch / remember -----

#[tokio::test]
async fn search_limit_boundaries() {
    let app = test_app().await;

    let over = post(
        &app.router,
        "/api/search",
        &json!({ "query": "anything", "limit": 101 }).to_string(),
    )
    .await;
    assert_eq!(over.status, StatusCode::BAD_REQUEST);

    let at_cap = post(
        &app.router,
        "/api/search",
        &json!({ "query": "anything", "limit": 100 }).to_string(),
    )
    .await;
    assert_eq!(at_cap.status, StatusCode::OK);
    assert!(at_cap.json()["code"].as_array().is_some());
}

#[tokio::test]
async fn fetch_id_count_boundaries() {
    let app = test_app().await;

    let empty = post(&app.router, "/api/fetch", &json!({ "ids": [] }).to_string()).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let twenty: Vec<String> = (0..20).map(|i| format!("id-{i}")).collect();
    let ok = post(
        &app.router,
        "/api/fetch",
        &json!({ "ids": twenty }).to_string(),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);

    let twenty_one: Vec<String> = (0..21).map(|i| format!("id-{i}")).collect();
    let over = post(
        &app.router,
        "/api/fetch",
        &json!({ "ids": twenty_one }).to_string(),
    )
    .await;
    assert_eq!(over.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn remember_then_search_finds_the_observation() {
    let app = test_app().await;

    let stored = post(
        &app.router,
        "/api/remember",
        &json!({
            "observation": "Avoid calling foo in a tight loop; it allocates a buffer each call.",
            "memory_type": "gotcha",
            "context": "src/hot_path.go",
            "tags": ["perf"],
        })
        .to_string(),
    )
    .await;
    assert_eq!(stored.status, StatusCode::OK);
    let body = stored.json();
    assert_eq!(body["stored"], true);
    let id = body["id"].as_str().expect("id").to_owned();

    let found = post(
        &app.router,
        "/api/search",
        &json!({
            "query": "Avoid calling foo in a tight loop; it allocates a buffer each call.",
            "search_type": "memory",
        })
        .to_string(),
    )
    .await;
    assert_eq!(found.status, StatusCode::OK);
    let results = found.json();
    let memory = results["memory"].as_array().expect("memory array");
    assert!(!memory.is_empty());
    assert_eq!(memory[0]["id"], id.as_str());
    assert!(memory[0]["relevance"].as_f64().expect("relevance") > 0.3);
}

#[tokio::test]
async fn remember_rejects_unknown_memory_type() {
    let app = test_app().await;
    let response = post(
        &app.router,
        "/api/remember",
        &json!({ "observation": "something", "memory_type": "vibes" }).to_string(),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["detail"]
        .as_str()
        .expect("detail")
        .contains("memory_type"));
}

// ----- hook events and activity browsing -----

#[tokio::test]
async fn hook_event_flow_builds_sessions_and_batches() {
    let app = test_app().await;

    let started = post(
        &app.router,
        "/api/activity/event",
        &json!({ "event": "session_start", "session_id": "s1", "agent": "claude-code" })
            .to_string(),
    )
    .await;
    assert_eq!(started.status, StatusCode::OK);
    assert_eq!(started.json()["created"], true);

    post(
        &app.router,
        "/api/activity/event",
        &json!({
            "event": "user_prompt", "session_id": "s1", "agent": "claude-code",
            "prompt": "fix the bug",
        })
        .to_string(),
    )
    .await;
    post(
        &app.router,
        "/api/activity/event",
        &json!({
            "event": "post_tool_use", "session_id": "s1", "agent": "claude-code",
            "tool_use_id": "tu-1",
            "tool_name": "Read", "tool_input": { "file_path": "src/main.rs" },
        })
        .to_string(),
    )
    .await;
    let ended = post(
        &app.router,
        "/api/activity/event",
        &json!({ "event": "session_end", "session_id": "s1", "agent": "claude-code" })
            .to_string(),
    )
    .await;
    assert_eq!(ended.status, StatusCode::OK);

    let sessions = get(&app.router, "/api/activity/sessions").await;
    assert_eq!(sessions.status, StatusCode::OK);
    let body = sessions.json();
    assert_eq!(body["total"], 1);
    let entry = &body["sessions"][0];
    assert_eq!(entry["session"]["id"], "s1");
    assert_eq!(entry["session"]["status"], "completed");
    assert_eq!(entry["first_prompt"], "fix the bug");
    assert_eq!(entry["stats"]["activity_count"], 1);
}

// ----- governance -----

#[tokio::test]
async fn observe_mode_downgrades_deny_and_writes_audit() {
    let mut config = CiConfig::default();
    config.governance.enforcement_mode = "observe".to_owned();
    config.governance.rules = vec![GovernanceRule {
        id: "no-rm".to_owned(),
        description: "deny recursive delete".to_owned(),
        tool: "Bash".to_owned(),
        pattern: Some(r"rm\s+-rf".to_owned()),
        path_pattern: None,
        action: "deny".to_owned(),
        message: "recursive deletes are blocked".to_owned(),
        enabled: true,
    }];
    let app = test_app_with(config, None).await;

    let response = post(
        &app.router,
        "/api/activity/event",
        &json!({
            "event": "pre_tool_use", "session_id": "s1", "agent": "claude-code",
            "tool_use_id": "tu-99",
            "tool_name": "Bash", "tool_input": { "command": "rm -rf /tmp/x" },
        })
        .to_string(),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    // Downgraded decision, no deny envelope.
    let body = response.json();
    assert_eq!(body["action"], "observe");
    assert!(body.get("hookSpecificOutput").is_none());
    assert!(body.get("permission").is_none());

    let audit = get(&app.router, "/api/governance/audit").await;
    let audit_body = audit.json();
    assert_eq!(audit_body["total"], 1);
    assert_eq!(audit_body["events"][0]["action"], "observe");
    assert_eq!(audit_body["events"][0]["rule_id"], "no-rm");
}

#[tokio::test]
async fn enforce_mode_returns_manifest_shaped_deny() {
    let mut config = CiConfig::default();
    config.governance.enforcement_mode = "enforce".to_owned();
    config.governance.rules = vec![GovernanceRule {
        id: "no-rm".to_owned(),
        description: String::new(),
        tool: "Bash".to_owned(),
        pattern: Some(r"rm\s+-rf".to_owned()),
        path_pattern: None,
        action: "deny".to_owned(),
        message: "recursive deletes are blocked".to_owned(),
        enabled: true,
    }];
    config.agents = vec![oakci_domain::value_objects::AgentManifest {
        name: "claude-code".to_owned(),
        deny_style: oakci_domain::value_objects::DenyStyle::HookSpecificOutput,
        response_summary_events: Vec::new(),
    }];
    let app = test_app_with(config, None).await;

    let response = post(
        &app.router,
        "/api/activity/event",
        &json!({
            "event": "pre_tool_use", "session_id": "s1", "agent": "claude-code",
            "tool_name": "Bash", "tool_input": { "command": "rm -rf /" },
        })
        .to_string(),
    )
    .await;
    let body = response.json();
    assert_eq!(body["hookSpecificOutput"]["permissionDecision"], "deny");
    assert_eq!(
        body["hookSpecificOutput"]["permissionDecisionReason"],
        "recursive deletes are blocked"
    );
}

#[tokio::test]
async fn governance_test_route_is_a_dry_run() {
    let app = test_app().await;
    let response = post(
        &app.router,
        "/api/governance/test",
        &json!({ "tool_name": "Bash", "tool_input": { "command": "ls" } }).to_string(),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["decision"]["action"], "allow");

    // Dry runs leave no audit trail.
    let audit = get(&app.router, "/api/governance/audit").await;
    assert_eq!(audit.json()["total"], 0);
}

// ----- backup -----

#[tokio::test]
async fn backup_create_restore_round_trip() {
    let app = test_app().await;

    post(
        &app.router,
        "/api/remember",
        &json!({ "observation": "backup me please", "memory_type": "discovery" }).to_string(),
    )
    .await;

    let created = post(&app.router, "/api/backup/create", "{}").await;
    assert_eq!(created.status, StatusCode::OK);
    assert!(created.json()["records"].as_i64().expect("records") >= 1);

    let status = get(&app.router, "/api/backup/status").await;
    assert_eq!(status.json()["exists"], true);

    // Restore over the same database is idempotent: duplicates conflict
    // silently and nothing doubles.
    let restored = post(&app.router, "/api/backup/restore", "{}").await;
    assert_eq!(restored.status, StatusCode::OK);

    let stats = get(&app.router, "/api/devtools/memory-stats").await;
    assert_eq!(stats.json()["sqlite_observations"], 1);
}

// ----- devtools -----

#[tokio::test]
async fn devtools_rebuild_and_trigger_processing() {
    let app = test_app().await;
    std::fs::write(
        app.state.paths.project_root().join("lib.rs"),
        "fn answer() -> i32 {\n    42\n}\n",
    )
    .expect("write");

    let rebuilt = post(&app.router, "/api/devtools/rebuild-index", "{}").await;
    assert_eq!(rebuilt.status, StatusCode::OK);
    assert!(rebuilt.json()["report"]["chunks_indexed"].as_i64().expect("chunks") >= 1);

    let processed = post(&app.router, "/api/devtools/trigger-processing", "{}").await;
    assert_eq!(processed.status, StatusCode::OK);
    assert!(processed.json()["report"].is_object());
}
