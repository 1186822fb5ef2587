//! Deep-link handling for the `?code=NNNN` query parameter.
//!
//! The page URL is the only state shared between the retrieval session and
//! the outside world. Writes are idempotent and only ever touch history; a
//! deep link never triggers navigation.

use std::sync::{Mutex, PoisonError};

use tracing::debug;
use url::Url;

use crate::access_code::AccessCode;
use crate::error::{CodedropError, Result};

/// Name of the query parameter carrying the code.
pub const CODE_PARAM: &str = "code";

/// Kind of history write performed on the page URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOp {
    /// A new history entry was pushed.
    Push,
    /// The current history entry was replaced.
    Replace,
}

/// A recorded history write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// How the URL was written.
    pub op: HistoryOp,
    /// The URL after the write.
    pub url: String,
}

/// Access to the browser-visible code.
pub trait DeepLink: Send + Sync {
    /// Returns the raw `code` parameter, if present.
    fn code(&self) -> Option<String>;

    /// Mirrors `code` into the URL. No-op if it is already present.
    fn set_code(&self, code: &AccessCode);

    /// Removes the code from the URL. No-op if it is absent.
    fn clear_code(&self);

    /// Returns the initial code if it is a valid 4-digit code.
    ///
    /// Malformed values are ignored silently.
    fn initial_code(&self) -> Option<AccessCode> {
        self.code().and_then(|raw| AccessCode::parse(&raw).ok())
    }
}

/// A [`DeepLink`] backed by an in-memory page URL with a history log.
#[derive(Debug)]
pub struct UrlDeepLink {
    inner: Mutex<UrlDeepLinkInner>,
}

#[derive(Debug)]
struct UrlDeepLinkInner {
    url: Url,
    history: Vec<HistoryEntry>,
}

impl UrlDeepLink {
    /// Creates a deep link for the given page URL.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if `page` is not an absolute URL.
    pub fn parse(page: &str) -> Result<Self> {
        let url = Url::parse(page).map_err(|_| CodedropError::invalid_url(page))?;
        Ok(Self::new(url))
    }

    /// Creates a deep link for an already parsed page URL.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self {
            inner: Mutex::new(UrlDeepLinkInner {
                url,
                history: Vec::new(),
            }),
        }
    }

    /// Returns the current page URL.
    #[must_use]
    pub fn current_url(&self) -> String {
        self.lock().url.to_string()
    }

    /// Returns every history write performed so far.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, UrlDeepLinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UrlDeepLinkInner {
    fn code(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == CODE_PARAM)
            .map(|(_, value)| value.into_owned())
    }

    fn rewrite(&mut self, code: Option<&str>, op: HistoryOp) {
        let others: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != CODE_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        self.url.set_query(None);
        if !others.is_empty() || code.is_some() {
            let mut pairs = self.url.query_pairs_mut();
            for (key, value) in &others {
                pairs.append_pair(key, value);
            }
            if let Some(code) = code {
                pairs.append_pair(CODE_PARAM, code);
            }
        }

        let url = self.url.to_string();
        debug!(?op, url = %url, "Deep link updated");
        self.history.push(HistoryEntry { op, url });
    }
}

impl DeepLink for UrlDeepLink {
    fn code(&self) -> Option<String> {
        self.lock().code()
    }

    fn set_code(&self, code: &AccessCode) {
        let mut inner = self.lock();
        if inner.code().as_deref() == Some(code.as_str()) {
            return;
        }
        inner.rewrite(Some(code.as_str()), HistoryOp::Push);
    }

    fn clear_code(&self) {
        let mut inner = self.lock();
        if inner.code().is_none() {
            return;
        }
        inner.rewrite(None, HistoryOp::Replace);
    }
}
