#![cfg(unix)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use hyperlens::{router, AppState, StagingArea};
use hyperlens_engine::{Dispatcher, ProcessEngine};
use hyperlens_protocol::StagingSettings;
use hyperlens_test_utils::payloads::{export_payload, inspect_payload};
use hyperlens_test_utils::{FakeEngine, TableFixture};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "hyperlens-test-boundary";

struct TestApp {
    router: Router,
    engine: FakeEngine,
    staging: TempDir,
}

impl TestApp {
    fn new(engine: FakeEngine) -> Self {
        Self::with_limit(engine, 1024 * 1024)
    }

    fn with_limit(engine: FakeEngine, max_upload_bytes: u64) -> Self {
        let staging = TempDir::new().expect("create staging dir");
        let settings = StagingSettings {
            dir: staging.path().to_path_buf(),
            max_upload_bytes,
            retention_secs: 3600,
            sweep_interval_secs: 1800,
        };
        let dispatcher = Dispatcher::from_engine(ProcessEngine::new(&engine.settings()));
        let router = router(AppState::new(dispatcher, StagingArea::new(&settings)));
        Self {
            router,
            engine,
            staging,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec(), headers)
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body, _) = self.send(request).await;
        let value = serde_json::from_slice(&body).unwrap_or_else(|e| {
            panic!("invalid JSON body ({}): {}", e, String::from_utf8_lossy(&body))
        });
        (status, value)
    }

    /// Upload `contents` as `filename` and return the staging id.
    async fn upload(&self, filename: &str, contents: &[u8]) -> (StatusCode, Value) {
        self.send_json(upload_request("hyperFile", filename, contents)).await
    }

    async fn staged(&self, filename: &str) -> String {
        let (status, body) = self.upload(filename, b"fake hyper bytes").await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["file"]["stagingId"].as_str().unwrap().to_string()
    }

    fn staged_count(&self) -> usize {
        std::fs::read_dir(self.staging.path()).unwrap().count()
    }
}

fn upload_request(field: &str, filename: &str, contents: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_upload_then_inspect() {
    let engine = FakeEngine::responding(&inspect_payload(
        "sales.hyper",
        &[TableFixture::numbered("Orders", 12)],
    ));
    let app = TestApp::new(engine);

    let (status, body) = app.upload("sales.hyper", b"fake hyper bytes").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["file"]["originalName"], "sales.hyper");
    assert_eq!(body["file"]["sizeBytes"], 16);
    let id = body["file"]["stagingId"].as_str().unwrap().to_string();
    assert!(id.ends_with("-sales.hyper"), "{}", id);

    let (status, body) = app.send_json(post_empty(&format!("/api/inspect/{}", id))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total_tables"], 1);
    assert_eq!(body["data"]["tables"][0]["name"], "Orders");
    assert_eq!(body["data"]["tables"][0]["row_count"], 12);

    let args = app.engine.recorded_args();
    assert_eq!(args[0], "inspect");
    assert!(args[1].ends_with(&id), "{:?}", args);
}

#[tokio::test]
async fn test_upload_rejects_non_hyper_file() {
    let app = TestApp::new(FakeEngine::from_script("exit 0"));

    let (status, body) = app.upload("notes.txt", b"hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains(".hyper"));
    assert_eq!(app.staged_count(), 0);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = TestApp::new(FakeEngine::from_script("exit 0"));

    let (status, body) = app
        .send_json(upload_request("somethingElse", "sales.hyper", b"x"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("hyperFile"));
    assert_eq!(app.staged_count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_leaves_nothing_behind() {
    let app = TestApp::with_limit(FakeEngine::from_script("exit 0"), 16);

    let (status, body) = app.upload("big.hyper", &[7u8; 64]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{}", body);
    assert_eq!(body["success"], false);
    assert_eq!(app.staged_count(), 0);
}

#[tokio::test]
async fn test_unknown_file_id_is_not_found() {
    let app = TestApp::new(FakeEngine::from_script("exit 0"));

    let (status, body) = app
        .send_json(post_empty("/api/inspect/1700000000000-0-deadbeef-gone.hyper"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(app.engine.recorded_calls().is_empty());
}

#[tokio::test]
async fn test_traversal_id_is_rejected() {
    let app = TestApp::new(FakeEngine::from_script("exit 0"));

    let (status, body) = app
        .send_json(post_empty("/api/inspect/..%2Fsecret.hyper"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(app.engine.recorded_calls().is_empty());
}

#[tokio::test]
async fn test_export_with_max_rows() {
    let engine = FakeEngine::responding(&export_payload(
        "sales.hyper",
        &[TableFixture::numbered("Orders", 1000)],
        Some(10),
    ));
    let app = TestApp::new(engine);
    let id = app.staged("sales.hyper").await;

    let (status, body) = app
        .send_json(post_json(
            &format!("/api/export/{}", id),
            json!({"sampleOnly": false, "maxRows": 10}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let table = &body["data"]["tables"][0];
    assert_eq!(table["total_rows"], 1000);
    assert_eq!(table["exported_rows"], 10);
    assert_eq!(table["data"].as_array().unwrap().len(), 10);
    assert_eq!(body["data"]["max_rows_per_table"], 10);
    assert_eq!(&app.engine.recorded_args()[2..], ["--max-rows", "10"]);
}

#[tokio::test]
async fn test_export_rejects_bad_max_rows() {
    let app = TestApp::new(FakeEngine::from_script("exit 0"));
    let id = app.staged("sales.hyper").await;

    for bad in [json!("abc"), json!(-4), json!(0), json!(2.5)] {
        let (status, body) = app
            .send_json(post_json(&format!("/api/export/{}", id), json!({"maxRows": bad})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "maxRows {}: {}", bad, body);
        assert_eq!(body["success"], false);
    }
    assert!(app.engine.recorded_calls().is_empty());
}

#[tokio::test]
async fn test_sample_export_ignores_max_rows() {
    let engine = FakeEngine::responding(&export_payload(
        "sales.hyper",
        &[TableFixture::numbered("Orders", 50)],
        Some(5),
    ));
    let app = TestApp::new(engine);
    let id = app.staged("sales.hyper").await;

    let (status, body) = app
        .send_json(post_json(
            &format!("/api/export/{}", id),
            json!({"sampleOnly": true, "maxRows": 0}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["export_type"], "sample_only");

    let (status, _, _) = app
        .send(get(&format!("/api/download/{}/json?sampleOnly=true&maxRows=abc", id)))
        .await;
    assert_eq!(status, StatusCode::OK);

    for call in app.engine.recorded_calls() {
        assert_eq!(&call[2..], ["--sample-only"]);
    }
}

#[tokio::test]
async fn test_engine_failure_maps_to_bad_gateway() {
    let app = TestApp::new(FakeEngine::failing(2, "file is corrupt"));
    let id = app.staged("broken.hyper").await;

    let (status, body) = app.send_json(post_empty(&format!("/api/inspect/{}", id))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("file is corrupt"));
}

#[tokio::test]
async fn test_download_csv_attachment() {
    let orders = TableFixture::new("Extract", "Orders")
        .column("id", "integer")
        .column("note", "text")
        .row(vec![json!(1), json!("plain")])
        .row(vec![json!(2), json!("a, \"quoted\" note")]);
    let engine = FakeEngine::responding(&export_payload("sales.hyper", &[orders], Some(5)));
    let app = TestApp::new(engine);
    let id = app.staged("sales.hyper").await;

    let (status, body, headers) = app
        .send(get(&format!("/api/download/{}/csv?sampleOnly=true", id)))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"sales_export.csv\""
    );
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "# Extract.Orders\nid,note\n1,plain\n2,\"a, \"\"quoted\"\" note\"\n"
    );
    assert_eq!(&app.engine.recorded_args()[2..], ["--sample-only"]);
}

#[tokio::test]
async fn test_download_rejects_unknown_format() {
    let app = TestApp::new(FakeEngine::from_script("exit 0"));
    let id = app.staged("sales.hyper").await;

    let (status, body) = app
        .send_json(get(&format!("/api/download/{}/xml", id)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("xml"));
}

#[tokio::test]
async fn test_health_and_file_listing() {
    let app = TestApp::new(FakeEngine::from_script("exit 0"));

    let (status, body) = app.send_json(get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["stagedFiles"], 0);

    let id = app.staged("sales.hyper").await;
    let (status, body) = app.send_json(get("/api/files")).await;
    assert_eq!(status, StatusCode::OK);
    let files = body["data"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["stagingId"], id.as_str());
    assert_eq!(files[0]["originalName"], "sales.hyper");
}
