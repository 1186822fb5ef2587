//! Integration tests for the document viewer.
//!
//! These tests serve documents from a local stub and load them through
//! `HttpFrame`, checking blocked detection, fallbacks, retry and download.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use codedrop_retrieval::{
    CodedropError, DocumentViewer, FallbackAction, HttpDownloader, HttpFrame, PageScroll,
    ViewerConfig, ViewerLoadState,
};

const PDF_BODY: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

// ============================================================================
// Stub document server
// ============================================================================

#[derive(Clone, Default)]
struct Documents {
    flaky_hits: Arc<AtomicUsize>,
}

fn pdf() -> Response {
    ([(header::CONTENT_TYPE, "application/pdf")], PDF_BODY).into_response()
}

async fn flaky(State(docs): State<Documents>) -> Response {
    if docs.flaky_hits.fetch_add(1, Ordering::SeqCst) == 0 {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    pdf()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(10)).await;
    pdf()
}

/// Spawns the document server and returns its base URL.
async fn spawn_documents(docs: Documents) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let base = format!("http://{}", listener.local_addr().expect("No local addr"));

    let router = Router::new()
        .route("/files/report.pdf", get(|| async { pdf() }))
        .route(
            "/files/framed.pdf",
            get(|| async {
                (
                    [
                        (header::CONTENT_TYPE, "application/pdf"),
                        (header::X_FRAME_OPTIONS, "DENY"),
                    ],
                    PDF_BODY,
                )
            }),
        )
        .route(
            "/files/csp.pdf",
            get(|| async {
                (
                    [(header::CONTENT_SECURITY_POLICY, "frame-ancestors 'none'")],
                    PDF_BODY,
                )
            }),
        )
        .route("/files/empty.pdf", get(|| async { "" }))
        .route("/files/flaky.pdf", get(flaky))
        .route("/files/slow.pdf", get(slow))
        .with_state(docs);

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    base
}

fn settings() -> ViewerConfig {
    ViewerConfig {
        block_timeout_ms: 300,
        retry_clear_delay_ms: 10,
        ..ViewerConfig::default()
    }
}

fn open_viewer(url: &str, scroll: &Arc<PageScroll>) -> DocumentViewer<HttpFrame> {
    let frame = HttpFrame::new(Duration::from_secs(5)).expect("frame");
    DocumentViewer::open(url, frame, scroll.clone(), settings())
}

/// Creates an empty scratch directory for downloads.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("codedrop-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

// ============================================================================
// Load Tests
// ============================================================================

/// Tests that an embeddable PDF loads without fallbacks.
#[tokio::test]
async fn test_viewer_loads_embeddable_pdf() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/report.pdf"), &scroll);

    assert!(scroll.is_locked());
    assert_eq!(viewer.load().await, ViewerLoadState::Loaded);
    assert!(viewer.fallback_actions().is_empty());
    assert_eq!(viewer.last_error(), None);

    viewer.close();
    assert!(!scroll.is_locked());
}

/// Tests that X-Frame-Options DENY is detected as blocked.
#[tokio::test]
async fn test_viewer_blocked_by_frame_options() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/framed.pdf"), &scroll);

    assert_eq!(viewer.load().await, ViewerLoadState::Blocked);
    assert_eq!(
        viewer.fallback_actions(),
        vec![
            FallbackAction::OpenExternally,
            FallbackAction::Download,
            FallbackAction::Retry,
        ]
    );
}

/// Tests that a frame-ancestors policy is detected as blocked.
#[tokio::test]
async fn test_viewer_blocked_by_content_security_policy() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/csp.pdf"), &scroll);

    assert_eq!(viewer.load().await, ViewerLoadState::Blocked);
}

/// Tests that a frame that never answers is declared blocked after the timeout.
#[tokio::test]
async fn test_viewer_silent_frame_is_blocked() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/slow.pdf"), &scroll);

    let state = tokio::time::timeout(Duration::from_secs(3), viewer.load())
        .await
        .expect("load should settle at the block timeout");

    assert_eq!(state, ViewerLoadState::Blocked);
}

/// Tests that a document that loads empty is blocked once the timeout passes.
#[tokio::test]
async fn test_viewer_empty_document_is_blocked() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/empty.pdf"), &scroll);

    let started = std::time::Instant::now();
    assert_eq!(viewer.load().await, ViewerLoadState::Blocked);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(viewer.fallback_actions().len(), 3);
}

/// Tests that a missing document is an error with the load message.
#[tokio::test]
async fn test_viewer_missing_document_errors() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/missing.pdf"), &scroll);

    assert_eq!(viewer.load().await, ViewerLoadState::Errored);
    let message = viewer.last_error().unwrap();
    assert!(message.starts_with("Failed to load PDF"), "got {message}");
    assert_eq!(viewer.fallback_actions().len(), 3);
}

/// Tests that retry reloads the same URL and can recover.
#[tokio::test]
async fn test_viewer_retry_recovers() {
    let docs = Documents::default();
    let base = spawn_documents(docs.clone()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/flaky.pdf"), &scroll);

    assert_eq!(viewer.load().await, ViewerLoadState::Errored);
    assert_eq!(viewer.retry().await, ViewerLoadState::Loaded);

    assert_eq!(docs.flaky_hits.load(Ordering::SeqCst), 2);
    assert_eq!(viewer.last_error(), None);
    assert!(scroll.is_locked());
}

// ============================================================================
// Download Tests
// ============================================================================

/// Tests that the download fallback saves the document under its own name.
#[tokio::test]
async fn test_viewer_download_saves_file() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = open_viewer(&format!("{base}/files/framed.pdf"), &scroll);
    assert_eq!(viewer.load().await, ViewerLoadState::Blocked);

    let dir = scratch_dir("download");
    let downloader = HttpDownloader::new(&dir, Duration::from_secs(5)).unwrap();
    let path = viewer.download(&downloader).await.unwrap();

    assert_eq!(path, dir.join("framed.pdf"));
    assert_eq!(std::fs::read(&path).unwrap(), PDF_BODY);

    let _ = std::fs::remove_dir_all(&dir);
}

/// Tests that downloading a missing document fails cleanly.
#[tokio::test]
async fn test_viewer_download_missing_document() {
    let base = spawn_documents(Documents::default()).await;
    let scroll = Arc::new(PageScroll::default());
    let viewer = open_viewer(&format!("{base}/files/missing.pdf"), &scroll);

    let dir = scratch_dir("missing");
    let downloader = HttpDownloader::new(&dir, Duration::from_secs(5)).unwrap();
    let err = viewer.download(&downloader).await.unwrap_err();

    assert!(matches!(err, CodedropError::DownloadFailed { .. }), "got {err:?}");
    assert!(!dir.join("missing.pdf").exists());
}
