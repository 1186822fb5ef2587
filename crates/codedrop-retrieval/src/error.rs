//! Error types for snippet retrieval.
//!
//! This module defines the error hierarchy for every retrieval operation,
//! from configuration loading through the snippet API calls, the session
//! state machine and the document viewer fallbacks.

use std::path::PathBuf;

/// A specialized `Result` type for codedrop retrieval operations.
pub type Result<T> = std::result::Result<T, CodedropError>;

/// Errors that can occur while retrieving and presenting a snippet.
///
/// Variants carry actionable suggestions where the user can do something
/// about the failure.
#[derive(Debug, thiserror::Error)]
pub enum CodedropError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your codedrop.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// The entered access code is not exactly four digits.
    #[error("Please enter a valid 4-digit code.")]
    InvalidAccessCode {
        /// The rejected input.
        input: String,
    },

    /// A new snippet was rejected before it reached the server.
    #[error("Invalid snippet: {message}")]
    InvalidSnippet {
        /// Why the snippet was rejected.
        message: String,
    },

    // ========================================================================
    // Snippet API Errors
    // ========================================================================
    /// No live snippet exists for the code (expired or never created).
    #[error("Snippet not found for code \"{code}\". It might have expired or never existed.")]
    NotFound {
        /// The code that was looked up.
        code: String,
    },

    /// The password for a protected snippet was rejected.
    #[error("Invalid password")]
    InvalidPassword,

    /// The server answered with a non-success status.
    #[error("{message}")]
    Server {
        /// HTTP status code returned by the server.
        status: u16,
        /// Server-supplied message, or a generic one when absent.
        message: String,
    },

    /// The server answered 200 with a body that matches no known shape.
    #[error("Unexpected response structure received for code \"{code}\".")]
    UnexpectedResponse {
        /// The code that was looked up.
        code: String,
    },

    /// The request never produced a response.
    #[error("Network error: {message}\n\nSuggestion: Check your connection and the API base URL")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // Presentation Errors
    // ========================================================================
    /// Content could not be opened as a URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// The rejected content.
        url: String,
    },

    /// The platform opener could not be launched.
    #[error("Failed to open '{url}': {message}")]
    OpenFailed {
        /// The URL that was being opened.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Downloading a document failed.
    #[error("Failed to download '{url}': {message}\n\nSuggestion: Open the document in the browser instead")]
    DownloadFailed {
        /// The URL that was being downloaded.
        url: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },
}

/// How a failed retrieval should be treated by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalErrorKind {
    /// The code has no live snippet.
    NotFound,
    /// Wrong password; the prompt stays open.
    InvalidPassword,
    /// Anything else: non-2xx statuses, transport failures, odd bodies.
    NetworkOrServer,
}

impl std::fmt::Display for RetrievalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::InvalidPassword => write!(f, "invalid_password"),
            Self::NetworkOrServer => write!(f, "network_or_server"),
        }
    }
}

impl CodedropError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidAccessCode` error.
    #[must_use]
    pub fn invalid_code(input: impl Into<String>) -> Self {
        Self::InvalidAccessCode {
            input: input.into(),
        }
    }

    /// Creates a new `InvalidSnippet` error.
    #[must_use]
    pub fn invalid_snippet(message: impl Into<String>) -> Self {
        Self::InvalidSnippet {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(code: impl Into<String>) -> Self {
        Self::NotFound { code: code.into() }
    }

    /// Creates a new `Server` error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `UnexpectedResponse` error.
    #[must_use]
    pub fn unexpected_response(code: impl Into<String>) -> Self {
        Self::UnexpectedResponse { code: code.into() }
    }

    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a new `OpenFailed` error.
    #[must_use]
    pub fn open_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `DownloadFailed` error.
    #[must_use]
    pub fn download_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Classifies this error for the retrieval session.
    #[must_use]
    pub const fn kind(&self) -> RetrievalErrorKind {
        match self {
            Self::NotFound { .. } => RetrievalErrorKind::NotFound,
            Self::InvalidPassword => RetrievalErrorKind::InvalidPassword,
            _ => RetrievalErrorKind::NetworkOrServer,
        }
    }

    /// Returns `true` if the user can retry the same code without starting over.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidPassword)
    }

    /// Returns `true` if the code reflected in the deep link must be removed.
    #[must_use]
    pub const fn clears_deep_link(&self) -> bool {
        !self.is_recoverable()
    }
}

impl From<reqwest::Error> for CodedropError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_matches_server_contract() {
        let err = CodedropError::not_found("1234");
        assert_eq!(
            err.to_string(),
            "Snippet not found for code \"1234\". It might have expired or never existed."
        );
    }

    #[test]
    fn test_config_validation_display_has_suggestion() {
        let err = CodedropError::config_validation("autoOpenSeconds must be greater than 0", "Set it to 5");
        let msg = err.to_string();
        assert!(msg.contains("autoOpenSeconds"));
        assert!(msg.contains("Suggestion: Set it to 5"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(CodedropError::not_found("1").kind(), RetrievalErrorKind::NotFound);
        assert_eq!(
            CodedropError::InvalidPassword.kind(),
            RetrievalErrorKind::InvalidPassword
        );
        assert_eq!(
            CodedropError::server(500, "boom").kind(),
            RetrievalErrorKind::NetworkOrServer
        );
        assert_eq!(
            CodedropError::transport("refused").kind(),
            RetrievalErrorKind::NetworkOrServer
        );
    }

    #[test]
    fn test_invalid_password_never_clears_deep_link() {
        assert!(CodedropError::InvalidPassword.is_recoverable());
        assert!(!CodedropError::InvalidPassword.clears_deep_link());

        assert!(CodedropError::not_found("1234").clears_deep_link());
        assert!(CodedropError::server(503, "down").clears_deep_link());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(RetrievalErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(
            RetrievalErrorKind::NetworkOrServer.to_string(),
            "network_or_server"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CodedropError = io_err.into();
        assert!(matches!(err, CodedropError::Io(_)));
    }
}
