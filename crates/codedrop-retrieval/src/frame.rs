//! HTTP-backed frame and downloader for the document viewer.
//!
//! [`HttpFrame`] stands in for a sandboxed browser frame: it loads the
//! resource and reads the same signals a browser would honour when deciding
//! whether a page may be embedded (`X-Frame-Options` and the CSP
//! `frame-ancestors` directive).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_SECURITY_POLICY, X_FRAME_OPTIONS};
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::USER_AGENT;
use crate::error::{CodedropError, Result};
use crate::viewer::{Downloader, FrameDocument, FrameEvent, FrameHost, LOAD_FAILED_MESSAGE};

/// Returns `true` if the response headers forbid embedding by a foreign page.
///
/// `X-Frame-Options` of `DENY` or `SAMEORIGIN` refuses, as does a
/// `frame-ancestors` directive that does not allow every origin.
#[must_use]
pub fn refuses_embedding(headers: &HeaderMap) -> bool {
    let frame_options = headers
        .get_all(X_FRAME_OPTIONS)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            let value = value.trim().to_ascii_uppercase();
            value == "DENY" || value == "SAMEORIGIN" || value.starts_with("ALLOW-FROM")
        });
    if frame_options {
        return true;
    }

    headers
        .get_all(CONTENT_SECURITY_POLICY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|policy| policy.split(';'))
        .filter_map(|directive| {
            let mut parts = directive.split_whitespace();
            parts
                .next()
                .filter(|name| name.eq_ignore_ascii_case("frame-ancestors"))
                .map(|_| parts.collect::<Vec<_>>())
        })
        .any(|sources| !sources.contains(&"*"))
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CodedropError::transport(format!("failed to build HTTP client: {e}")))
}

// ============================================================================
// HttpFrame
// ============================================================================

/// A [`FrameHost`] that loads its source over HTTP.
#[derive(Debug)]
pub struct HttpFrame {
    client: Client,
    document: Arc<Mutex<FrameDocument>>,
    events: Option<mpsc::Receiver<FrameEvent>>,
    task: Option<JoinHandle<()>>,
}

impl HttpFrame {
    /// Creates a frame whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(build_client(timeout)?))
    }

    /// Creates a frame using an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            document: Arc::new(Mutex::new(FrameDocument::Empty)),
            events: None,
            task: None,
        }
    }

    fn set_document(document: &Mutex<FrameDocument>, value: FrameDocument) {
        *document.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

#[async_trait]
impl FrameHost for HttpFrame {
    fn set_source(&mut self, url: &str) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Self::set_document(&self.document, FrameDocument::Empty);
        self.events = None;

        if url.is_empty() {
            debug!("Frame cleared");
            return;
        }

        let (sender, receiver) = mpsc::channel(1);
        self.events = Some(receiver);

        let client = self.client.clone();
        let document = Arc::clone(&self.document);
        let url = url.to_string();
        self.task = Some(tokio::spawn(async move {
            let event = match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let refused = refuses_embedding(response.headers());
                    match response.bytes().await {
                        Ok(body) => {
                            let loaded = if refused {
                                FrameDocument::CrossOrigin
                            } else if body.is_empty() {
                                FrameDocument::Empty
                            } else {
                                FrameDocument::Accessible
                            };
                            debug!(url = %url, document = ?loaded, bytes = body.len(), "Frame loaded");
                            Self::set_document(&document, loaded);
                            FrameEvent::Loaded
                        }
                        Err(e) => FrameEvent::Failed(format!("{LOAD_FAILED_MESSAGE}: {e}")),
                    }
                }
                Ok(response) => FrameEvent::Failed(format!(
                    "{LOAD_FAILED_MESSAGE} (status {})",
                    response.status().as_u16()
                )),
                Err(e) => FrameEvent::Failed(format!("{LOAD_FAILED_MESSAGE}: {e}")),
            };
            // The receiver is gone if the source changed meanwhile.
            let _ = sender.send(event).await;
        }));
    }

    async fn next_event(&mut self) -> FrameEvent {
        let next = match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        };
        match next {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    fn inspect(&self) -> FrameDocument {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HttpFrame {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// HttpDownloader
// ============================================================================

/// A [`Downloader`] that saves documents into a directory.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    dir: PathBuf,
}

impl HttpDownloader {
    /// Creates a downloader writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            dir: dir.into(),
        })
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let failed = |e: &dyn std::fmt::Display| CodedropError::download_failed(url, e.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| failed(&e))?;
        let body = response.bytes().await.map_err(|e| failed(&e))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| failed(&e))?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &body).await.map_err(|e| failed(&e))?;

        info!(url, path = %path.display(), bytes = body.len(), "Document downloaded");
        Ok(path)
    }
}
