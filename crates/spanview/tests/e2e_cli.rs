use std::io::Write;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use prost::Message;
use serial_test::serial;

const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_spanview")
}

/// Runs the binary with a config path that never exists, so a developer's
/// own config file cannot leak into the test.
fn command() -> Command {
    let mut cmd = Command::new(bin());
    cmd.env("SPANVIEW_CONFIG", "/nonexistent/spanview.toml")
        .env_remove("SPANVIEW_TEMPO_URL")
        .env_remove("SPANVIEW_TEMPO_HEADERS")
        .env_remove("SPANVIEW_TEMPO_TIMEOUT")
        .env_remove("SPANVIEW_LISTEN_ADDR")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT");
    cmd
}

fn write_trace(dir: &std::path::Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

async fn spawn_tempo_stub() -> String {
    async fn trace(Path(id): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
        if id == TRACE_ID {
            // Tempo v2 wraps the batches in a `trace` object.
            Ok(Json(serde_json::json!({
                "trace": testkit::two_service_trace_json(&id)
            })))
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    let app = Router::new().route("/api/traces/{id}", get(trace));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[test]
#[serial]
fn render_json_file_as_json() {
    let temp = tempfile::tempdir().unwrap();
    let body = serde_json::to_vec(&testkit::two_service_trace_json("t1")).unwrap();
    let path = write_trace(temp.path(), "trace.json", &body);

    let output = command().arg("--json").arg("render").arg(&path).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["summary"]["spanCount"], 2);
    assert_eq!(value["summary"]["errorCount"], 1);
    assert_eq!(value["rows"][0]["spanId"], "1");
    assert_eq!(value["rows"][1]["offset"], 200.0);
    assert_eq!(value["rows"][1]["attributes"]["db.cached"], false);
}

#[test]
#[serial]
fn render_protobuf_file_as_text() {
    let temp = tempfile::tempdir().unwrap();
    let mut body = Vec::new();
    testkit::two_service_export_request(&[9; 16])
        .encode(&mut body)
        .unwrap();
    let path = write_trace(temp.path(), "trace.pb", &body);

    let output = command().arg("render").arg(&path).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("TRACE 09090909090909090909090909090909"));
    assert!(stdout.contains("spans=2 errors=1 services=db,web"));
    assert!(stdout.contains("web GET /checkout (1000ms) +0ms"));
    assert!(stdout.contains("  db SELECT orders (600ms) +200ms"));
    assert!(stdout.contains("ERROR deadlock detected"));
}

#[test]
#[serial]
fn render_reads_stdin() {
    let body = serde_json::to_vec(&testkit::cyclic_trace_json("t4")).unwrap();
    let output = command()
        .arg("--json")
        .arg("render")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            child.stdin.take().unwrap().write_all(&body)?;
            child.wait_with_output()
        })
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["rows"].as_array().unwrap().len(), 4);
    assert_eq!(value["issues"][0]["kind"]["type"], "cycle_broken");
}

#[test]
#[serial]
fn render_rejects_garbage() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_trace(temp.path(), "trace.json", b"not json");

    let output = command().arg("render").arg(&path).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid OTLP JSON"));
}

#[tokio::test]
#[serial]
async fn fetch_renders_trace_from_tempo() {
    let tempo = spawn_tempo_stub().await;

    let output = tokio::task::spawn_blocking(move || {
        command()
            .arg("--json")
            .arg("fetch")
            .arg(TRACE_ID.to_uppercase())
            .arg("--tempo-url")
            .arg(tempo)
            .output()
    })
    .await
    .unwrap()
    .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["summary"]["traceId"], TRACE_ID);
    assert_eq!(value["summary"]["rootName"], "GET /checkout");
}

#[tokio::test]
#[serial]
async fn fetch_reports_missing_trace() {
    let tempo = spawn_tempo_stub().await;

    let output = tokio::task::spawn_blocking(move || {
        command()
            .arg("fetch")
            .arg("00000000000000000000000000000001")
            .env("SPANVIEW_TEMPO_URL", tempo)
            .output()
    })
    .await
    .unwrap()
    .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

fn spawn_serve(port: u16, tempo: &str) -> Child {
    command()
        .arg("serve")
        .arg("--listen")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--tempo-url")
        .arg(tempo)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

async fn wait_http_ready(port: u16, child: &mut Child) {
    let client = reqwest::Client::new();
    let mut ready = false;
    for _ in 0..100 {
        assert!(child.try_wait().unwrap().is_none(), "spanview exited early");
        if client
            .get(format!("http://127.0.0.1:{port}/healthz"))
            .send()
            .await
            .is_ok()
        {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(ready, "waterfall endpoint not ready");
}

#[tokio::test]
#[serial]
async fn serve_renders_posted_and_fetched_traces() {
    let tempo = spawn_tempo_stub().await;
    let port = free_port();
    let mut child = spawn_serve(port, &tempo);
    wait_http_ready(port, &mut child).await;

    let client = reqwest::Client::new();
    let posted: serde_json::Value = client
        .post(format!("http://127.0.0.1:{port}/v1/waterfall"))
        .json(&testkit::shuffled_tree_json("t2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(posted["summary"]["spanCount"], 8);
    assert_eq!(posted["rows"][0]["spanId"], "root");

    let resp = client
        .get(format!("http://127.0.0.1:{port}/api/traces/{TRACE_ID}/waterfall"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let fetched: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(fetched["rows"][1]["serviceName"], "db");

    let missing = client
        .get(format!(
            "http://127.0.0.1:{port}/api/traces/00000000000000000000000000000001/waterfall"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let _ = child.kill();
    let _ = child.wait();
}
