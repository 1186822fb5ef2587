//! Integration tests for snippet retrieval over HTTP.
//!
//! These tests run a stub snippet API on a local port and drive
//! `HttpSnippetClient` and `RetrievalSession` against it end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use codedrop_display::{DisplayKind, DisplaySnippet, HtmlRenderer};
use codedrop_retrieval::{
    AccessCode, CodedropError, CodeLookup, Config, ContentKind, ContentOpener, DeepLink, ExpirationDays,
    HttpSnippetClient, NewSnippet, NoticeKind, Notifier, ProtectionState, RetrievalEvent,
    RetrievalSession, RetrievalStatus, SnippetApi, SnippetContentType, UrlDeepLink,
};
use serde_json::{json, Value};
use tokio::time::timeout;

const PASSWORD: &str = "hunter2";

// ============================================================================
// Stub API
// ============================================================================

#[derive(Clone, Default)]
struct Stub {
    base: Arc<Mutex<String>>,
    created: Arc<Mutex<Option<Value>>>,
}

fn snippet(content: &str, content_type: &str) -> Value {
    json!({
        "content": content,
        "contentType": content_type,
        "createdAt": "2025-01-05T15:04:00Z",
        "expiresAt": "2025-01-06T15:04:00Z",
        "views": 3
    })
}

async fn lookup(State(stub): State<Stub>, Path(code): Path<String>) -> Response {
    let base = stub.base.lock().unwrap().clone();
    match code.as_str() {
        "1111" => Json(json!({ "snippet": snippet("hello world", "plain") })).into_response(),
        "2222" => Json(json!({ "snippet": snippet("https://example.com/docs", "plain") }))
            .into_response(),
        "3333" => Json(json!({
            "snippet": snippet(&format!("{base}/files/report.pdf"), "plain")
        }))
        .into_response(),
        "4444" | "6666" => Json(json!({ "isProtected": true })).into_response(),
        "5555" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "database unavailable" })),
        )
            .into_response(),
        "8888" => Json(json!({ "unexpected": true })).into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Snippet not found" })),
        )
            .into_response(),
    }
}

async fn protected(Path(code): Path<String>, Json(body): Json<Value>) -> Response {
    if code == "6666" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid password" })),
        )
            .into_response();
    }
    Json(json!({ "snippet": snippet("fn main() {}", "code") })).into_response()
}

async fn create(State(stub): State<Stub>, Json(body): Json<Value>) -> Response {
    *stub.created.lock().unwrap() = Some(body);
    (
        StatusCode::CREATED,
        Json(json!({ "code": "7777", "expiresAt": "2025-01-08T15:04:00Z" })),
    )
        .into_response()
}

/// Spawns the stub API and returns its base URL.
async fn spawn_stub(stub: Stub) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let base = format!("http://{}", listener.local_addr().expect("No local addr"));
    *stub.base.lock().unwrap() = base.clone();

    let router = Router::new()
        .route("/api/snippets", post(create))
        .route("/api/snippets/:code", get(lookup))
        .route("/api/snippets/protected/:code", post(protected))
        .route("/files/report.pdf", get(|| async { "%PDF-1.4 stub" }))
        .with_state(stub);

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    base
}

// ============================================================================
// Session harness
// ============================================================================

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<(ContentKind, String)>>,
}

impl ContentOpener for RecordingOpener {
    fn open_website(&self, url: &str) -> codedrop_retrieval::Result<()> {
        self.opened
            .lock()
            .unwrap()
            .push((ContentKind::Website, url.to_string()));
        Ok(())
    }

    fn open_document(&self, url: &str) -> codedrop_retrieval::Result<()> {
        self.opened
            .lock()
            .unwrap()
            .push((ContentKind::Pdf, url.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeKind, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

struct Harness {
    session: RetrievalSession,
    deep_link: Arc<UrlDeepLink>,
    opener: Arc<RecordingOpener>,
    notifier: Arc<RecordingNotifier>,
}

fn test_config(base: &str) -> Config {
    Config {
        api_base_url: base.to_string(),
        app_url: "http://app.test/".to_string(),
        auto_open_seconds: 2,
        tick_interval_ms: 50,
        request_timeout_secs: 5,
        ..Config::default()
    }
}

fn harness(base: &str, page: &str) -> Harness {
    let config = test_config(base);
    let client = HttpSnippetClient::new(base, config.request_timeout()).expect("client");
    let deep_link = Arc::new(UrlDeepLink::parse(page).expect("page url"));
    let opener = Arc::new(RecordingOpener::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let session = RetrievalSession::new(config, Arc::new(client))
        .expect("session")
        .with_deep_link(deep_link.clone())
        .with_opener(opener.clone())
        .with_notifier(notifier.clone());

    Harness {
        session,
        deep_link,
        opener,
        notifier,
    }
}

/// Waits for the first `content_opened` event.
async fn wait_for_open(events: &mut tokio::sync::broadcast::Receiver<RetrievalEvent>) -> (ContentKind, String) {
    timeout(Duration::from_secs(5), async {
        loop {
            if let RetrievalEvent::ContentOpened(payload) = events.recv().await.expect("events") {
                return (payload.kind, payload.url);
            }
        }
    })
    .await
    .expect("Timeout waiting for content to open")
}

// ============================================================================
// Client Tests
// ============================================================================

/// Tests that a public snippet comes back as a record.
#[tokio::test]
async fn test_client_fetches_public_snippet() {
    let base = spawn_stub(Stub::default()).await;
    let client = HttpSnippetClient::new(&base, Duration::from_secs(5)).unwrap();

    let lookup = client
        .fetch_by_code(&AccessCode::parse("1111").unwrap())
        .await
        .unwrap();

    let CodeLookup::Found(record) = lookup else {
        panic!("expected a record, got {lookup:?}");
    };
    assert_eq!(record.content, "hello world");
    assert_eq!(record.views, 3);
}

/// Tests that a 401 on the protected endpoint maps to `InvalidPassword`.
#[tokio::test]
async fn test_client_wrong_password_is_invalid_password() {
    let base = spawn_stub(Stub::default()).await;
    let client = HttpSnippetClient::new(&base, Duration::from_secs(5)).unwrap();

    let err = client
        .fetch_with_password(&AccessCode::parse("4444").unwrap(), "nope")
        .await
        .unwrap_err();

    assert!(matches!(err, CodedropError::InvalidPassword));
}

/// Tests that a 200 with an unknown body shape is reported as unexpected.
#[tokio::test]
async fn test_client_unexpected_body() {
    let base = spawn_stub(Stub::default()).await;
    let client = HttpSnippetClient::new(&base, Duration::from_secs(5)).unwrap();

    let err = client
        .fetch_by_code(&AccessCode::parse("8888").unwrap())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Unexpected response structure received for code \"8888\"."
    );
}

/// Tests sharing a snippet and the request body the server receives.
#[tokio::test]
async fn test_client_creates_snippet() {
    let stub = Stub::default();
    let base = spawn_stub(stub.clone()).await;
    let client = HttpSnippetClient::new(&base, Duration::from_secs(5)).unwrap();

    let created = client
        .create_snippet(
            &NewSnippet::new("SELECT 1;", SnippetContentType::Code)
                .with_language("sql")
                .with_expiration(ExpirationDays::Seven)
                .with_password(PASSWORD),
        )
        .await
        .unwrap();

    assert_eq!(created.code, "7777");

    let body = stub.created.lock().unwrap().clone().unwrap();
    assert_eq!(body["content"], "SELECT 1;");
    assert_eq!(body["contentType"], "code");
    assert_eq!(body["language"], "sql");
    assert_eq!(body["expirationDays"], 7);
    assert_eq!(body["isProtected"], true);
    assert_eq!(body["password"], PASSWORD);
}

/// Tests that an unreachable server surfaces as a transport error.
#[tokio::test]
async fn test_client_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let client = HttpSnippetClient::new(&base, Duration::from_secs(2)).unwrap();

    let err = client
        .fetch_by_code(&AccessCode::parse("1111").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, CodedropError::Transport { .. }), "got {err:?}");
}

// ============================================================================
// Session Tests
// ============================================================================

/// Tests that plain text is displayed without a countdown.
#[tokio::test]
async fn test_session_displays_plain_snippet() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    let status = h.session.submit_code("1111").await.unwrap();

    assert_eq!(status, RetrievalStatus::Displaying);
    let state = h.session.snapshot();
    assert_eq!(state.record.unwrap().content, "hello world");
    assert_eq!(state.classification, Some(ContentKind::Other));
    assert_eq!(state.countdown, None);
    assert_eq!(h.deep_link.code().as_deref(), Some("1111"));
}

/// Tests that a website opens exactly once when the countdown finishes.
#[tokio::test]
async fn test_session_opens_website_after_countdown() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");
    let mut events = h.session.subscribe();

    h.session.submit_code("2222").await.unwrap();
    let (kind, url) = wait_for_open(&mut events).await;

    assert_eq!(kind, ContentKind::Website);
    assert_eq!(url, "https://example.com/docs");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.opener.opened.lock().unwrap().len(), 1);
}

/// Tests that a PDF goes to the document viewer.
#[tokio::test]
async fn test_session_opens_pdf_in_viewer() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");
    let mut events = h.session.subscribe();

    h.session.submit_code("3333").await.unwrap();
    let (kind, url) = wait_for_open(&mut events).await;

    assert_eq!(kind, ContentKind::Pdf);
    assert_eq!(url, format!("{base}/files/report.pdf"));
    assert!(h.session.snapshot().viewer_open);
}

/// Tests that cancelling auto-open leaves the content unopened.
#[tokio::test]
async fn test_session_cancel_auto_open() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    h.session.submit_code("2222").await.unwrap();
    assert!(h.session.cancel_auto_open());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(h.opener.opened.lock().unwrap().is_empty());
    assert_eq!(h.session.snapshot().status, RetrievalStatus::Displaying);
}

/// Tests the password flow: prompt, rejection, then success.
#[tokio::test]
async fn test_session_protected_snippet_flow() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    let status = h.session.submit_code("4444").await.unwrap();
    assert_eq!(status, RetrievalStatus::ProtectionPending);
    assert!(h.session.snapshot().record.is_none());

    let status = h.session.submit_password("wrong").await.unwrap();
    assert_eq!(status, RetrievalStatus::ProtectionPending);
    let state = h.session.snapshot();
    assert_eq!(state.password_error.as_deref(), Some("Invalid password"));
    assert_eq!(state.code.map(|c| c.to_string()).as_deref(), Some("4444"));

    let status = h.session.submit_password(PASSWORD).await.unwrap();
    assert_eq!(status, RetrievalStatus::Displaying);
    let state = h.session.snapshot();
    assert_eq!(state.protection, ProtectionState::Satisfied);
    assert_eq!(state.password_error, None);
    assert_eq!(state.record.unwrap().content, "fn main() {}");
}

/// Tests that a server failure while verifying fails the attempt.
#[tokio::test]
async fn test_session_protected_server_failure() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    h.session.submit_code("6666").await.unwrap();
    let status = h.session.submit_password(PASSWORD).await.unwrap();

    assert_eq!(status, RetrievalStatus::Failed);
    assert!(h.session.snapshot().record.is_none());
    let notices = h.notifier.notices.lock().unwrap();
    assert_eq!(notices.last().map(|(kind, _)| *kind), Some(NoticeKind::Error));
}

/// Tests that an unknown code fails and strips the deep link.
#[tokio::test]
async fn test_session_not_found_from_deep_link() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/?code=9999&ref=mail");

    let status = h.session.start_from_deep_link().await.unwrap();

    assert_eq!(status, Some(RetrievalStatus::Failed));
    let state = h.session.snapshot();
    assert_eq!(
        state.error.as_deref(),
        Some("Snippet not found for code \"9999\". It might have expired or never existed.")
    );
    assert_eq!(h.deep_link.code(), None);
    assert_eq!(h.deep_link.current_url(), "http://app.test/?ref=mail");
}

/// Tests that the server's error message reaches the user.
#[tokio::test]
async fn test_session_server_error_message() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    let status = h.session.submit_code("5555").await.unwrap();

    assert_eq!(status, RetrievalStatus::Failed);
    let notices = h.notifier.notices.lock().unwrap();
    assert_eq!(
        notices.as_slice(),
        &[(NoticeKind::Error, "database unavailable".to_string())]
    );
}

/// Tests that a deep link retrieves the snippet on start.
#[tokio::test]
async fn test_session_starts_from_deep_link() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/?code=1111");

    let status = h.session.start_from_deep_link().await.unwrap();

    assert_eq!(status, Some(RetrievalStatus::Displaying));
    assert_eq!(h.deep_link.code().as_deref(), Some("1111"));
}

/// Tests that a new code replaces the displayed record.
#[tokio::test]
async fn test_session_new_code_replaces_record() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    h.session.submit_code("2222").await.unwrap();
    h.session.submit_code("1111").await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    let state = h.session.snapshot();
    assert_eq!(state.record.unwrap().content, "hello world");
    assert!(h.opener.opened.lock().unwrap().is_empty());
    assert_eq!(h.deep_link.code().as_deref(), Some("1111"));
}

/// Tests that reset returns to idle and clears the link.
#[tokio::test]
async fn test_session_reset_after_display() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    h.session.submit_code("2222").await.unwrap();
    h.session.reset();

    tokio::time::sleep(Duration::from_millis(250)).await;
    let state = h.session.snapshot();
    assert_eq!(state.status, RetrievalStatus::Idle);
    assert!(state.record.is_none());
    assert_eq!(h.deep_link.code(), None);
    assert!(h.opener.opened.lock().unwrap().is_empty());
}

// ============================================================================
// Display Tests
// ============================================================================

/// Tests that a verified code snippet renders with the code block markup.
#[tokio::test]
async fn test_retrieved_code_renders_as_html() {
    let base = spawn_stub(Stub::default()).await;
    let h = harness(&base, "http://app.test/");

    h.session.submit_code("4444").await.unwrap();
    h.session.submit_password(PASSWORD).await.unwrap();
    let record = h.session.snapshot().record.unwrap();

    let snippet = DisplaySnippet {
        content: record.content,
        kind: DisplayKind::Code,
        language: record.language,
        created_at: record.created_at,
        expires_at: record.expires_at,
        views: record.views,
    };
    let html = HtmlRenderer::new(&snippet).render();

    assert!(html.starts_with(r#"<article class="snippet snippet-code">"#));
    assert!(html.contains(r#"<div class="code-block" data-language="#));
    assert!(html.contains("Views: 3"));
    assert!(html.contains(r#"<span class="line-number">1</span>"#));
}
