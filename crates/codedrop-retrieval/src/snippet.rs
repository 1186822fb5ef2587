//! Snippet data model shared by the access client and the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CodedropError, Result};

/// Minimum password length accepted when sharing a protected snippet.
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// How the snippet's author asked for the content to be presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetContentType {
    /// Preformatted plain text (default).
    #[default]
    Plain,
    /// Markdown rendered to HTML.
    Markdown,
    /// Source code with syntax highlighting.
    Code,
}

impl std::fmt::Display for SnippetContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Markdown => write!(f, "markdown"),
            Self::Code => write!(f, "code"),
        }
    }
}

/// A retrieved snippet.
///
/// Records are replaced wholesale by a new retrieval and never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetRecord {
    /// The snippet body.
    pub content: String,

    /// Presentation hint for the body.
    #[serde(default)]
    pub content_type: SnippetContentType,

    /// Language hint, only meaningful for [`SnippetContentType::Code`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// When the snippet was created.
    pub created_at: DateTime<Utc>,

    /// When the snippet stops being retrievable.
    pub expires_at: DateTime<Utc>,

    /// How many times the snippet has been viewed.
    #[serde(default)]
    pub views: u64,
}

impl SnippetRecord {
    /// Returns the language hint, treating an empty string as absent.
    #[must_use]
    pub fn language_hint(&self) -> Option<&str> {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
    }
}

/// How long a shared snippet stays retrievable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExpirationDays {
    /// One day (default).
    #[default]
    One,
    /// Three days.
    Three,
    /// One week.
    Seven,
    /// Thirty days.
    Thirty,
}

impl ExpirationDays {
    /// Number of days this expiration represents.
    #[must_use]
    pub const fn days(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Three => 3,
            Self::Seven => 7,
            Self::Thirty => 30,
        }
    }

    /// Human description, e.g. "1 day" or "7 days".
    #[must_use]
    pub fn description(self) -> String {
        match self {
            Self::One => "1 day".to_string(),
            other => format!("{} days", other.days()),
        }
    }
}

impl TryFrom<u8> for ExpirationDays {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            3 => Ok(Self::Three),
            7 => Ok(Self::Seven),
            30 => Ok(Self::Thirty),
            other => Err(format!(
                "invalid expiration '{other}': expected one of 1, 3, 7, 30"
            )),
        }
    }
}

impl From<ExpirationDays> for u8 {
    fn from(value: ExpirationDays) -> Self {
        value.days()
    }
}

/// A snippet about to be shared.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSnippet {
    /// The snippet body.
    pub content: String,
    /// Presentation hint.
    pub content_type: SnippetContentType,
    /// Language hint for code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Retention period.
    pub expiration_days: ExpirationDays,
    /// Whether retrieval requires the password.
    pub is_protected: bool,
    /// Password for protected snippets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl NewSnippet {
    /// Creates an unprotected snippet with default expiration.
    #[must_use]
    pub fn new(content: impl Into<String>, content_type: SnippetContentType) -> Self {
        Self {
            content: content.into(),
            content_type,
            language: None,
            expiration_days: ExpirationDays::default(),
            is_protected: false,
            password: None,
        }
    }

    /// Sets the language hint.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the retention period.
    #[must_use]
    pub const fn with_expiration(mut self, expiration: ExpirationDays) -> Self {
        self.expiration_days = expiration;
        self
    }

    /// Protects the snippet with a password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.is_protected = true;
        self.password = Some(password.into());
        self
    }

    /// Checks the snippet before it is sent.
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(CodedropError::invalid_snippet("content must not be empty"));
        }
        if self.is_protected {
            let length = self.password.as_deref().map_or(0, |p| p.chars().count());
            if length < MIN_PASSWORD_LENGTH {
                return Err(CodedropError::invalid_snippet(format!(
                    "Password must be at least {MIN_PASSWORD_LENGTH} characters"
                )));
            }
        }
        Ok(())
    }
}

/// The server's answer to a successful share.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSnippet {
    /// The access code assigned by the server.
    pub code: String,
    /// When the snippet expires.
    pub expires_at: DateTime<Utc>,
}
