// Integration tests for the reqwest-backed artifact source against a fake
// upstream server.

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use artifact_loader::source::http_source::HttpArtifactSource;
use artifact_loader::source::traits::ArtifactSource;

const ARTIFACT_BODY: &str = "let unit = { name: 'Remote' };";

async fn serve_artifact() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/javascript".to_string())],
        ARTIFACT_BODY,
    )
}

/// Start a fake upstream on a random port, returning its base url.
async fn start_upstream() -> String {
    let app = Router::new().route("/app.js", get(serve_artifact));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn test_fetch_returns_the_raw_payload() {
    let base = start_upstream().await;
    let source = HttpArtifactSource::new();

    let payload = source.fetch(&format!("{}/app.js", base)).await.unwrap();
    assert_eq!(payload, Bytes::from_static(ARTIFACT_BODY.as_bytes()));
}

#[tokio::test]
async fn test_fetch_maps_http_status_failures() {
    let base = start_upstream().await;
    let source = HttpArtifactSource::new();

    let err = source
        .fetch(&format!("{}/missing.js", base))
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(404));
    assert!(err.message.contains("HTTP 404"));
}

#[tokio::test]
async fn test_executor_hook_runs_before_the_fetch_resolves() {
    let base = start_upstream().await;
    let executed: Arc<Mutex<Vec<(String, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let executed_hook = Arc::clone(&executed);

    let source = HttpArtifactSource::new().with_executor(Arc::new(move |url, payload| {
        executed_hook.lock().push((url.to_string(), payload.len()));
        Ok(())
    }));

    let url = format!("{}/app.js", base);
    source.fetch(&url).await.unwrap();

    assert_eq!(
        executed.lock().as_slice(),
        [(url, ARTIFACT_BODY.len())]
    );
}

#[tokio::test]
async fn test_executor_failure_surfaces_as_fetch_error() {
    let base = start_upstream().await;
    let source = HttpArtifactSource::new()
        .with_executor(Arc::new(|_, _| Err(anyhow::anyhow!("eval blew up"))));

    let err = source.fetch(&format!("{}/app.js", base)).await.unwrap_err();
    assert_eq!(err.status, None);
    assert!(err.message.contains("execute failed"));
    assert!(err.message.contains("eval blew up"));
}
