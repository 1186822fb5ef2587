//! Access client for the external snippet API.
//!
//! # Endpoints
//!
//! - `GET /api/snippets/{code}` - Fetch a snippet, or learn that it is protected
//! - `POST /api/snippets/protected/{code}` - Fetch a protected snippet with its password
//! - `POST /api/snippets` - Share a new snippet
//!
//! The client normalizes every response into [`CodeLookup`], a
//! [`SnippetRecord`] or a [`CodedropError`]. It performs the network call and
//! nothing else: no deep-link, storage or timer side effects.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::access_code::AccessCode;
use crate::error::{CodedropError, Result};
use crate::snippet::{CreatedSnippet, NewSnippet, SnippetRecord};

/// User agent string for codedrop.
pub(crate) const USER_AGENT: &str = concat!("codedrop/", env!("CARGO_PKG_VERSION"));

/// Message used when the protected endpoint fails without saying why.
const PROTECTED_FALLBACK_MESSAGE: &str = "Failed to access protected snippet";

// ============================================================================
// Outcomes
// ============================================================================

/// Successful outcome of a lookup by code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeLookup {
    /// The snippet is public and was returned.
    Found(SnippetRecord),
    /// The snippet exists but needs a password; no content was returned.
    ProtectionRequired,
}

/// Operations the retrieval session needs from the snippet API.
#[async_trait]
pub trait SnippetApi: Send + Sync {
    /// Looks up a snippet by code.
    ///
    /// A 404 maps to [`CodedropError::NotFound`]; other failures map to
    /// [`CodedropError::Server`] or [`CodedropError::Transport`].
    async fn fetch_by_code(&self, code: &AccessCode) -> Result<CodeLookup>;

    /// Fetches a protected snippet.
    ///
    /// A 401 maps to [`CodedropError::InvalidPassword`] so the caller can keep
    /// the password prompt open.
    async fn fetch_with_password(&self, code: &AccessCode, password: &str)
        -> Result<SnippetRecord>;
}

// ============================================================================
// Wire Types
// ============================================================================

/// Every field the snippet endpoints may put in a response body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBody {
    #[serde(default)]
    snippet: Option<SnippetRecord>,
    #[serde(default)]
    is_protected: bool,
    #[serde(default)]
    error: Option<String>,
}

impl ApiBody {
    /// Parses a body leniently; non-JSON bodies count as empty.
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct PasswordRequest<'a> {
    password: &'a str,
}

/// Maps a `GET /api/snippets/{code}` response.
pub(crate) fn interpret_lookup(code: &AccessCode, status: StatusCode, body: &str) -> Result<CodeLookup> {
    let body = ApiBody::parse(body);

    if status == StatusCode::NOT_FOUND {
        return Err(CodedropError::not_found(code.as_str()));
    }
    if !status.is_success() {
        let message = body.error.unwrap_or_else(|| {
            format!(
                "Failed to retrieve snippet for code \"{code}\" (status {})",
                status.as_u16()
            )
        });
        return Err(CodedropError::server(status.as_u16(), message));
    }

    if body.is_protected {
        return Ok(CodeLookup::ProtectionRequired);
    }
    body.snippet
        .map(CodeLookup::Found)
        .ok_or_else(|| CodedropError::unexpected_response(code.as_str()))
}

/// Maps a `POST /api/snippets/protected/{code}` response.
pub(crate) fn interpret_protected(
    code: &AccessCode,
    status: StatusCode,
    body: &str,
) -> Result<SnippetRecord> {
    let body = ApiBody::parse(body);

    if status == StatusCode::UNAUTHORIZED {
        return Err(CodedropError::InvalidPassword);
    }
    if !status.is_success() {
        let message = body
            .error
            .unwrap_or_else(|| PROTECTED_FALLBACK_MESSAGE.to_string());
        return Err(CodedropError::server(status.as_u16(), message));
    }

    body.snippet
        .ok_or_else(|| CodedropError::unexpected_response(code.as_str()))
}

// ============================================================================
// HTTP Client
// ============================================================================

/// [`SnippetApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSnippetClient {
    inner: Client,
    base_url: Url,
}

impl HttpSnippetClient {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| CodedropError::config_validation(
                format!("invalid API base URL '{base_url}': {e}"),
                "Set apiBaseUrl to an absolute http(s) URL in your codedrop.json",
            ))?;

        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CodedropError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { inner, base_url })
    }

    /// Returns the API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Shares a new snippet and returns its code.
    pub async fn create_snippet(&self, snippet: &NewSnippet) -> Result<CreatedSnippet> {
        snippet.validate()?;

        let url = self.endpoint("/api/snippets");
        debug!(url = %url, content_type = %snippet.content_type, "POST new snippet");

        let response = self.inner.post(&url).json(snippet).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "Response received");

        if !status.is_success() {
            let message = ApiBody::parse(&body)
                .error
                .unwrap_or_else(|| format!("Failed to create snippet (status {})", status.as_u16()));
            return Err(CodedropError::server(status.as_u16(), message));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl SnippetApi for HttpSnippetClient {
    async fn fetch_by_code(&self, code: &AccessCode) -> Result<CodeLookup> {
        let url = self.endpoint(&format!("/api/snippets/{code}"));
        debug!(url = %url, "GET snippet");

        let response = self.inner.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "Response received");

        interpret_lookup(code, status, &body)
    }

    async fn fetch_with_password(
        &self,
        code: &AccessCode,
        password: &str,
    ) -> Result<SnippetRecord> {
        let url = self.endpoint(&format!("/api/snippets/protected/{code}"));
        debug!(url = %url, "POST protected snippet");

        let response = self
            .inner
            .post(&url)
            .json(&PasswordRequest { password })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "Response received");

        interpret_protected(code, status, &body)
    }
}
