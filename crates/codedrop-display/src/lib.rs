//! Codedrop Snippet Display
//!
//! Presentation of retrieved snippets. Nothing here makes decisions about
//! retrieval; it only turns content into something a person can read.
//!
//! # Renderers
//!
//! - [`HtmlRenderer`] - Safe HTML: rendered markdown, highlighted code with
//!   line numbers and a copy affordance, or preformatted plain text
//! - [`TextRenderer`] - Terminal output with the same metadata header
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use codedrop_display::{DisplayKind, DisplaySnippet, HtmlRenderer};
//!
//! let snippet = DisplaySnippet {
//!     content: "fn main() {}".to_string(),
//!     kind: DisplayKind::Code,
//!     language: Some("rs".to_string()),
//!     created_at: Utc.with_ymd_and_hms(2025, 1, 5, 15, 4, 0).unwrap(),
//!     expires_at: Utc.with_ymd_and_hms(2025, 1, 6, 15, 4, 0).unwrap(),
//!     views: 2,
//! };
//!
//! let html = HtmlRenderer::new(&snippet).render();
//! assert!(html.contains(r#"<span class="tok-keyword">fn</span>"#));
//! ```

pub mod clipboard;
pub mod detect;
pub mod format;
pub mod highlight;
mod render;

pub use clipboard::{copy_or_warn, copy_to_clipboard};
pub use detect::detect_language;
pub use format::format_timestamp;
pub use highlight::{highlight, Language, Token, TokenKind};
pub use render::{escape_html, HtmlRenderer, TextRenderer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while presenting a snippet.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The system clipboard could not take the text.
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Result type for display operations.
pub type Result<T> = std::result::Result<T, DisplayError>;

// ============================================================================
// Display Snippet (local copy to avoid cross-crate dependency)
// ============================================================================

/// How a snippet's content should be presented.
///
/// Mirrors the retrieval crate's content type so this crate stays independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    /// Preformatted text.
    #[default]
    Plain,
    /// Rendered markdown.
    Markdown,
    /// Highlighted source code.
    Code,
}

impl DisplayKind {
    /// CSS-friendly name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Markdown => "markdown",
            Self::Code => "code",
        }
    }
}

/// Everything the renderers need to show one snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySnippet {
    /// Raw content.
    pub content: String,
    /// Presentation kind.
    pub kind: DisplayKind,
    /// Language hint for code.
    pub language: Option<String>,
    /// When the snippet was created.
    pub created_at: DateTime<Utc>,
    /// When the snippet expires.
    pub expires_at: DateTime<Utc>,
    /// How often it has been viewed.
    pub views: u64,
}

impl DisplaySnippet {
    /// Resolves the language used for highlighting.
    ///
    /// Falls back to a content-based guess, then to JavaScript.
    #[must_use]
    pub fn resolved_language(&self) -> Language {
        Language::resolve(self.language.as_deref(), &self.content)
    }
}
