//! End-to-end tests that drive the real HTTP surface over a loopback socket.
//!
//! Each test builds an `AppState` against a temp project directory, binds a
//! real `TcpListener` on an ephemeral port, and talks to it with `reqwest` -
//! the same shape the daemon runs in production, just pointed at a scratch
//! project instead of a real one.

use prism_daemon::config::Config;
use prism_daemon::server::create_app;
use prism_daemon::state::AppState;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

fn config_for(root: &Path) -> Config {
    let index_dir = root.join(".prism");
    std::fs::create_dir_all(&index_dir).unwrap();
    Config {
        project_root: root.to_path_buf(),
        port: 0,
        enable_watcher: false,
        shutdown_timeout_ms: 1000,
        index_dir,
    }
}

/// Spins up the real router on a loopback ephemeral port and returns its base URL.
/// The server task is detached; the process exiting at test end cleans it up.
async fn spawn_server(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn cold_start_build_search_restart_reuses_snapshot() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("widget.js"),
        "export function renderWidget() { return 42; }\n",
    )
    .unwrap();

    let config = config_for(dir.path());
    let state = AppState::new(config.clone());
    state.indexer.build_full().await.unwrap();
    state.indexer.save().await.unwrap();

    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/search"))
        .json(&serde_json::json!({ "query": "renderWidget" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["file"], "widget.js");

    // Restarting against the same project root must load the persisted
    // snapshot rather than re-walking the tree.
    let reloaded_state = AppState::new(config_for(dir.path()));
    reloaded_state.indexer.load().await.unwrap();
    assert_eq!(reloaded_state.indexer.file_count(), 1);
    assert!(reloaded_state.indexer.get_file("widget.js").is_ok());
}

#[tokio::test]
async fn watcher_create_modify_delete_reflected_within_two_seconds() {
    let dir = TempDir::new().unwrap();
    let config = config_for(dir.path());
    let state = AppState::new(config);
    state.indexer.build_full().await.unwrap();
    state.watcher.enable();

    // Give the supervisor a moment to stand up the debouncer before the
    // first filesystem event, mirroring the daemon's own startup ordering.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let file_path = dir.path().join("created.py");
    std::fs::write(&file_path, "def created():\n    pass\n").unwrap();
    wait_until(Duration::from_secs(3), || {
        state.indexer.get_file("created.py").is_ok()
    })
    .await;
    assert!(state.indexer.get_file("created.py").is_ok());

    std::fs::write(&file_path, "def created():\n    return 'modified'\n").unwrap();
    wait_until(Duration::from_secs(3), || {
        state
            .indexer
            .get_file("created.py")
            .map(|r| r.content.contains("modified"))
            .unwrap_or(false)
    })
    .await;

    std::fs::remove_file(&file_path).unwrap();
    wait_until(Duration::from_secs(3), || {
        state.indexer.get_file("created.py").is_err()
    })
    .await;
    assert!(state.indexer.get_file("created.py").is_err());
}

async fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) {
    let start = tokio::time::Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn path_traversal_via_tools_call_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("safe.md"), "# hi\n").unwrap();
    let state = AppState::new(config_for(dir.path()));
    state.indexer.build_full().await.unwrap();

    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/tools/call"))
        .json(&serde_json::json!({
            "name": "get_file",
            "arguments": { "path": "../../etc/passwd" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{base}/tools/call"))
        .json(&serde_json::json!({
            "name": "get_file",
            "arguments": { "path": "safe.md" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn oversize_query_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(config_for(dir.path()));
    state.indexer.build_full().await.unwrap();

    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let long_query = "a".repeat(10_001);
    let resp = client
        .post(format!("{base}/search"))
        .json(&serde_json::json!({ "query": long_query }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn oversize_body_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(config_for(dir.path()));
    state.indexer.build_full().await.unwrap();

    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let huge_query = "a".repeat(2 * 1024 * 1024);
    let resp = client
        .post(format!("{base}/search"))
        .json(&serde_json::json!({ "query": huge_query }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
}

#[tokio::test]
async fn concurrent_reindex_requests_coalesce() {
    let dir = TempDir::new().unwrap();
    for i in 0..20 {
        std::fs::write(dir.path().join(format!("f{i}.rs")), "fn f() {}\n").unwrap();
    }
    let state = AppState::new(config_for(dir.path()));
    state.indexer.build_full().await.unwrap();

    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let (first, second) = tokio::join!(
        client.post(format!("{base}/index")).send(),
        client.post(format!("{base}/index")).send(),
    );
    let statuses: Vec<u16> = vec![first.unwrap().status().as_u16(), second.unwrap().status().as_u16()];
    assert!(statuses.contains(&202), "expected one 202 indexing: {statuses:?}");
    assert!(
        statuses.contains(&200),
        "expected one 200 already_running: {statuses:?}"
    );
}

#[tokio::test]
async fn health_and_ready_report_index_state() {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(config_for(dir.path()));

    let base = spawn_server(state.clone()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("{base}/ready")).send().await.unwrap();
    assert_eq!(resp.status(), 503);

    state.indexer.build_full().await.unwrap();
    let resp = client.get(format!("{base}/ready")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}
