//! Content classification for retrieved snippets.
//!
//! Decides whether snippet content is a link worth opening automatically and,
//! if so, whether it points at a PDF that should go to the document viewer.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Hosts that serve documents behind viewer pages rather than at `.pdf` paths.
const DOCUMENT_HOSTS: &[&str] = &[
    "drive.google.com",
    "docs.google.com",
    "dropbox.com",
    "onedrive.live.com",
    "1drv.ms",
];

/// What retrieved content is, as far as auto-open is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// An absolute URL that opens in a new browser context.
    Website,
    /// An absolute URL to a PDF, shown in the document viewer.
    Pdf,
    /// Anything else; never opened automatically.
    Other,
}

impl ContentKind {
    /// Returns `true` if this kind starts an auto-open countdown.
    #[must_use]
    pub const fn is_openable(self) -> bool {
        matches!(self, Self::Website | Self::Pdf)
    }

    /// Short label used in prompts ("Opening PDF in 3 seconds").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Pdf => "PDF",
            Self::Other => "content",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Website => write!(f, "website"),
            Self::Pdf => write!(f, "pdf"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Classifies snippet content.
///
/// The content is trimmed and parsed as an absolute URL with a host. Text that
/// does not parse is [`ContentKind::Other`]. URLs carrying a PDF hint are
/// [`ContentKind::Pdf`]; every other URL is [`ContentKind::Website`]. The
/// result depends only on the trimmed string.
///
/// # Examples
///
/// ```
/// use codedrop_retrieval::{classify, ContentKind};
///
/// assert_eq!(classify("hello"), ContentKind::Other);
/// assert_eq!(classify("https://example.com"), ContentKind::Website);
/// assert_eq!(classify(" https://example.com/doc.PDF "), ContentKind::Pdf);
/// ```
#[must_use]
pub fn classify(content: &str) -> ContentKind {
    let trimmed = content.trim();
    let Some(url) = parse_absolute_url(trimmed) else {
        return ContentKind::Other;
    };

    if has_pdf_hint(trimmed, &url) {
        ContentKind::Pdf
    } else {
        ContentKind::Website
    }
}

/// Parses `text` as an absolute URL that names a host.
///
/// Scheme-only strings such as `note: call me` parse as URLs but have no
/// host, so they are rejected here.
#[must_use]
pub fn parse_absolute_url(text: &str) -> Option<Url> {
    if text.is_empty() {
        return None;
    }
    let url = Url::parse(text).ok()?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Some(url),
        _ => None,
    }
}

fn has_pdf_hint(raw: &str, url: &Url) -> bool {
    let lowered = raw.to_lowercase();
    let path = url.path().to_lowercase();
    let query = url.query().unwrap_or_default().to_lowercase();

    if lowered.ends_with(".pdf") || path.ends_with(".pdf") {
        return true;
    }
    if lowered.contains("/pdf/") || lowered.contains("application/pdf") {
        return true;
    }
    if query.contains(".pdf") {
        return true;
    }

    let host = url.host_str().unwrap_or_default().to_lowercase();
    let document_host = DOCUMENT_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{known}")));
    document_host && lowered.contains(".pdf")
}
