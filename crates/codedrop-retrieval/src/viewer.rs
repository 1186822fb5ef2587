//! Embedded document viewer.
//!
//! A [`DocumentViewer`] shows one resource URL inside a sandboxed frame and
//! tries to notice when the remote host silently refuses to be embedded.
//! Detection is best-effort and layered:
//!
//! 1. The frame's load event arrives but its document is cross-origin: `Blocked`.
//! 2. The frame reports a genuine load failure: `Errored`.
//! 3. Once `blockTimeoutMs` has passed since the source was set, the document
//!    is inspected and an empty or inaccessible one is treated as `Blocked`.
//!    A load event with an empty document waits for this check too.
//!
//! All three signals are advisory and converge on the same states. Blocked
//! and errored viewers offer the same fallbacks: open externally, download,
//! retry. The viewer state never leaks into the retrieval session.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ViewerConfig;
use crate::error::Result;
use crate::opener::ContentOpener;

/// File name used when a URL has no usable last path segment.
pub const DEFAULT_DOWNLOAD_NAME: &str = "document.pdf";

/// Message recorded when the frame fails without details.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load PDF";

// ============================================================================
// Frame abstraction
// ============================================================================

/// Load state of the viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerLoadState {
    /// A load attempt is in progress.
    #[default]
    Loading,
    /// The document is shown.
    Loaded,
    /// The host refused to be embedded.
    Blocked,
    /// The load failed.
    Errored,
}

impl ViewerLoadState {
    /// Returns `true` for states that offer fallback actions.
    #[must_use]
    pub const fn needs_fallback(&self) -> bool {
        matches!(self, Self::Blocked | Self::Errored)
    }
}

/// Signal raised by a frame after its source was set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// The frame finished loading something.
    Loaded,
    /// The frame could not load its source.
    Failed(String),
}

/// What the viewer can see of the frame's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDocument {
    /// The document is readable and has content.
    Accessible,
    /// Nothing has been rendered yet.
    Empty,
    /// The document belongs to a foreign origin that refuses embedding.
    CrossOrigin,
}

/// A sandboxed frame the viewer renders into.
#[async_trait]
pub trait FrameHost: Send {
    /// Points the frame at `url`. An empty string clears the frame.
    fn set_source(&mut self, url: &str);

    /// Waits for the next load or error signal.
    ///
    /// May never resolve; the viewer bounds it with a timeout.
    async fn next_event(&mut self) -> FrameEvent;

    /// Inspects the frame's current document.
    fn inspect(&self) -> FrameDocument;
}

/// Saves documents for the download fallback.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` as `file_name` and returns where it was written.
    ///
    /// # Errors
    ///
    /// Returns `DownloadFailed` if the resource cannot be fetched or written.
    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf>;
}

// ============================================================================
// Scroll lock
// ============================================================================

/// Page scrolling that the viewer suspends while it is open.
pub trait ScrollLock: Send + Sync {
    /// Suspends scrolling.
    fn acquire(&self);
    /// Restores scrolling.
    fn release(&self);
}

/// Holds the scroll lock for as long as it lives.
pub struct ScrollGuard {
    lock: Arc<dyn ScrollLock>,
}

impl ScrollGuard {
    /// Acquires `lock` until the guard is dropped.
    #[must_use]
    pub fn acquire(lock: Arc<dyn ScrollLock>) -> Self {
        lock.acquire();
        Self { lock }
    }
}

impl Drop for ScrollGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl std::fmt::Debug for ScrollGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollGuard").finish_non_exhaustive()
    }
}

/// A [`ScrollLock`] that only tracks whether scrolling is suspended.
#[derive(Debug, Default)]
pub struct PageScroll {
    locked: AtomicBool,
}

impl PageScroll {
    /// Returns `true` while scrolling is suspended.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

impl ScrollLock for PageScroll {
    fn acquire(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Fallbacks
// ============================================================================

/// Actions offered when the document cannot be shown inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    /// Open the URL outside the viewer.
    OpenExternally,
    /// Save the document locally.
    Download,
    /// Tear down and reload the frame.
    Retry,
}

impl FallbackAction {
    /// Button label for the action.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenExternally => "Open in New Tab",
            Self::Download => "Download",
            Self::Retry => "Retry",
        }
    }
}

/// Picks a file name for downloading `url`.
///
/// Uses the last path segment, or [`DEFAULT_DOWNLOAD_NAME`] when there is none.
///
/// # Examples
///
/// ```
/// use codedrop_retrieval::viewer::download_file_name;
///
/// assert_eq!(download_file_name("https://a.io/files/report.pdf?dl=1"), "report.pdf");
/// assert_eq!(download_file_name("https://a.io/"), "document.pdf");
/// ```
#[must_use]
pub fn download_file_name(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

// ============================================================================
// DocumentViewer
// ============================================================================

/// Viewer for a single document URL.
#[derive(Debug)]
pub struct DocumentViewer<F: FrameHost> {
    url: String,
    frame: F,
    settings: ViewerConfig,
    state: ViewerLoadState,
    last_error: Option<String>,
    _scroll: ScrollGuard,
}

impl<F: FrameHost> DocumentViewer<F> {
    /// Opens the viewer for `url`, suspending page scrolling.
    ///
    /// Nothing is loaded until [`load`](Self::load) is called.
    pub fn open(
        url: impl Into<String>,
        frame: F,
        scroll: Arc<dyn ScrollLock>,
        settings: ViewerConfig,
    ) -> Self {
        let url = url.into();
        info!(url = %url, sandbox = %settings.sandbox, "Opening document viewer");
        Self {
            url,
            frame,
            settings,
            state: ViewerLoadState::Loading,
            last_error: None,
            _scroll: ScrollGuard::acquire(scroll),
        }
    }

    /// Loads the document and returns the resulting state.
    pub async fn load(&mut self) -> ViewerLoadState {
        self.state = ViewerLoadState::Loading;
        self.last_error = None;
        self.frame.set_source(&self.url);

        let deadline = Instant::now() + self.settings.block_timeout();
        let state = match timeout(self.settings.block_timeout(), self.frame.next_event()).await {
            Ok(FrameEvent::Loaded) => match self.frame.inspect() {
                FrameDocument::Accessible => ViewerLoadState::Loaded,
                FrameDocument::CrossOrigin => ViewerLoadState::Blocked,
                FrameDocument::Empty => {
                    sleep_until(deadline).await;
                    self.settle_after_timeout()
                }
            },
            Ok(FrameEvent::Failed(message)) => {
                warn!(url = %self.url, error = %message, "Document failed to load");
                self.last_error = Some(message);
                ViewerLoadState::Errored
            }
            Err(_) => self.settle_after_timeout(),
        };

        self.state = state;
        info!(url = %self.url, state = ?state, "Document viewer state");
        state
    }

    /// Inspects the frame once the block timeout has passed.
    fn settle_after_timeout(&self) -> ViewerLoadState {
        match self.frame.inspect() {
            FrameDocument::Accessible => ViewerLoadState::Loaded,
            FrameDocument::Empty | FrameDocument::CrossOrigin => {
                debug!(
                    url = %self.url,
                    timeout_ms = self.settings.block_timeout_ms,
                    "No accessible document before timeout"
                );
                ViewerLoadState::Blocked
            }
        }
    }

    /// Clears the frame, waits briefly, then loads the same URL again.
    pub async fn retry(&mut self) -> ViewerLoadState {
        self.state = ViewerLoadState::Loading;
        self.last_error = None;
        self.frame.set_source("");
        sleep(self.settings.retry_clear_delay()).await;
        self.load().await
    }

    /// Current load state.
    #[must_use]
    pub const fn state(&self) -> ViewerLoadState {
        self.state
    }

    /// URL being shown.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Message of the last load failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Sandbox flags applied to the frame.
    #[must_use]
    pub fn sandbox(&self) -> &str {
        &self.settings.sandbox
    }

    /// Actions to offer in the current state.
    #[must_use]
    pub fn fallback_actions(&self) -> Vec<FallbackAction> {
        if self.state.needs_fallback() {
            vec![
                FallbackAction::OpenExternally,
                FallbackAction::Download,
                FallbackAction::Retry,
            ]
        } else {
            Vec::new()
        }
    }

    /// Opens the document outside the viewer.
    ///
    /// # Errors
    ///
    /// Propagates the opener's failure.
    pub fn open_externally(&self, opener: &dyn ContentOpener) -> Result<()> {
        opener.open_website(&self.url)
    }

    /// Downloads the document under its derived file name.
    ///
    /// # Errors
    ///
    /// Propagates the downloader's failure.
    pub async fn download(&self, downloader: &dyn Downloader) -> Result<PathBuf> {
        let file_name = download_file_name(&self.url);
        downloader.download(&self.url, &file_name).await
    }

    /// Closes the viewer, restoring page scrolling.
    pub fn close(self) {
        debug!(url = %self.url, "Closing document viewer");
    }
}
