//! Retrieval state types.
//!
//! [`RetrievalState`] is the single owner of everything a retrieval session
//! knows: the code, the snippet record, the protection tri-state, the derived
//! classification and the countdown value. Transitions are plain methods so the
//! machine can be tested without timers or a network.
//!
//! Every transition that starts asynchronous work bumps `generation`. Results
//! are applied only when they carry the current generation, so responses for
//! abandoned or superseded requests are dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access_code::AccessCode;
use crate::classify::{classify, ContentKind};
use crate::client::CodeLookup;
use crate::error::{CodedropError, Result};
use crate::snippet::SnippetRecord;

/// Local error shown next to the password prompt after a 401.
pub const INVALID_PASSWORD_MESSAGE: &str = "Invalid password";

// ============================================================================
// RetrievalStatus
// ============================================================================

/// Where a retrieval session currently is.
///
/// - `Idle` -> `Validating` -> `Fetching`
/// - From `Fetching`: `ProtectionPending`, `Displaying` or `Failed`
/// - From `ProtectionPending`: `Verifying` -> `Displaying`, back to
///   `ProtectionPending` (wrong password) or `Failed`
/// - Any state -> `Idle` on reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    /// No code entered.
    #[default]
    Idle,
    /// A code was entered and is being checked.
    Validating,
    /// The primary lookup is in flight.
    Fetching,
    /// The server asked for a password.
    ProtectionPending,
    /// A password-verified lookup is in flight.
    Verifying,
    /// A snippet is being shown.
    Displaying,
    /// The last attempt failed.
    Failed,
}

impl RetrievalStatus {
    /// Returns `true` while a network request is outstanding.
    ///
    /// # Examples
    ///
    /// ```
    /// use codedrop_retrieval::RetrievalStatus;
    ///
    /// assert!(RetrievalStatus::Fetching.is_busy());
    /// assert!(RetrievalStatus::Verifying.is_busy());
    /// assert!(!RetrievalStatus::Displaying.is_busy());
    /// ```
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Fetching | Self::Verifying)
    }

    /// Returns `true` if a new code may be entered from this status.
    ///
    /// A new code supersedes any request in flight and replaces a displayed
    /// record wholesale.
    #[must_use]
    pub const fn accepts_code(&self) -> bool {
        !matches!(self, Self::Validating)
    }
}

impl std::fmt::Display for RetrievalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Fetching => "fetching",
            Self::ProtectionPending => "protection_pending",
            Self::Verifying => "verifying",
            Self::Displaying => "displaying",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// ProtectionState
// ============================================================================

/// Password gate status for the current code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionState {
    /// Not determined yet.
    #[default]
    Unknown,
    /// The server indicated a password gate.
    Required,
    /// The password was accepted and the record is available.
    Satisfied,
}

// ============================================================================
// RetrievalState
// ============================================================================

/// Complete state of one retrieval session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalState {
    /// Current status.
    pub status: RetrievalStatus,

    /// The code being retrieved, once validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<AccessCode>,

    /// The retrieved snippet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<SnippetRecord>,

    /// Password gate status.
    pub protection: ProtectionState,

    /// Classification of `record.content`, computed once per record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ContentKind>,

    /// Seconds left before openable content is opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,

    /// Message of the last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Local error shown on the password prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_error: Option<String>,

    /// Token of the latest issued request.
    pub generation: u64,

    /// Whether the document viewer has been opened for this record.
    pub viewer_open: bool,

    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

impl Default for RetrievalState {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrievalState {
    /// Creates an idle state.
    ///
    /// # Examples
    ///
    /// ```
    /// use codedrop_retrieval::{ProtectionState, RetrievalState, RetrievalStatus};
    ///
    /// let state = RetrievalState::new();
    /// assert_eq!(state.status, RetrievalStatus::Idle);
    /// assert_eq!(state.protection, ProtectionState::Unknown);
    /// assert!(state.record.is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: RetrievalStatus::Idle,
            code: None,
            record: None,
            protection: ProtectionState::Unknown,
            classification: None,
            countdown: None,
            error: None,
            password_error: None,
            generation: 0,
            viewer_open: false,
            updated_at: Utc::now(),
        }
    }

    /// Updates the `updated_at` timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns `true` if `generation` belongs to the latest request.
    #[must_use]
    pub const fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Accepts a validated code and enters `Validating`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` while another code is being validated.
    pub fn begin_validation(&mut self, code: AccessCode) -> Result<()> {
        if !self.status.accepts_code() {
            return Err(CodedropError::invalid_transition(
                self.status,
                RetrievalStatus::Validating,
            ));
        }
        self.status = RetrievalStatus::Validating;
        self.code = Some(code);
        self.touch();
        Ok(())
    }

    /// Enters `Fetching`, clearing the previous record, and returns the
    /// request token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the state is `Validating`.
    pub fn begin_fetch(&mut self) -> Result<u64> {
        if self.status != RetrievalStatus::Validating {
            return Err(CodedropError::invalid_transition(
                self.status,
                RetrievalStatus::Fetching,
            ));
        }
        self.clear_outcome();
        self.status = RetrievalStatus::Fetching;
        self.generation += 1;
        self.touch();
        Ok(self.generation)
    }

    /// Applies the primary lookup result.
    ///
    /// Returns `false` and leaves the state untouched if the result is stale.
    /// A found record moves to `Displaying` and, when the content is openable,
    /// arms the countdown at `auto_open_seconds`. A protection signal moves to
    /// `ProtectionPending` without storing any content.
    pub fn apply_lookup(
        &mut self,
        generation: u64,
        lookup: CodeLookup,
        auto_open_seconds: u32,
    ) -> bool {
        if !self.is_current(generation) || self.status != RetrievalStatus::Fetching {
            return false;
        }
        match lookup {
            CodeLookup::Found(record) => self.display(record, auto_open_seconds),
            CodeLookup::ProtectionRequired => {
                self.status = RetrievalStatus::ProtectionPending;
                self.protection = ProtectionState::Required;
            }
        }
        self.touch();
        true
    }

    /// Records a failed primary lookup. Returns `false` if stale.
    pub fn apply_failure(&mut self, generation: u64, message: impl Into<String>) -> bool {
        if !self.is_current(generation) || self.status != RetrievalStatus::Fetching {
            return false;
        }
        self.fail(message.into());
        true
    }

    /// Enters `Verifying` and returns the request token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the state is `ProtectionPending`.
    pub fn begin_verification(&mut self) -> Result<u64> {
        if self.status != RetrievalStatus::ProtectionPending {
            return Err(CodedropError::invalid_transition(
                self.status,
                RetrievalStatus::Verifying,
            ));
        }
        self.status = RetrievalStatus::Verifying;
        self.password_error = None;
        self.generation += 1;
        self.touch();
        Ok(self.generation)
    }

    /// Applies a password-verified record. Returns `false` if stale.
    pub fn apply_verified(
        &mut self,
        generation: u64,
        record: SnippetRecord,
        auto_open_seconds: u32,
    ) -> bool {
        if !self.is_current(generation) || self.status != RetrievalStatus::Verifying {
            return false;
        }
        self.protection = ProtectionState::Satisfied;
        self.display(record, auto_open_seconds);
        self.touch();
        true
    }

    /// Returns to `ProtectionPending` with a local password error.
    ///
    /// The code is kept so the user can retry. Returns `false` if stale.
    pub fn apply_password_rejected(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.status != RetrievalStatus::Verifying {
            return false;
        }
        self.status = RetrievalStatus::ProtectionPending;
        self.password_error = Some(INVALID_PASSWORD_MESSAGE.to_string());
        self.touch();
        true
    }

    /// Records a failed verification that was not a password rejection.
    /// Returns `false` if stale.
    pub fn apply_verification_failure(
        &mut self,
        generation: u64,
        message: impl Into<String>,
    ) -> bool {
        if !self.is_current(generation) || self.status != RetrievalStatus::Verifying {
            return false;
        }
        self.fail(message.into());
        true
    }

    /// Returns to `Idle`, clearing all retrieval data.
    ///
    /// The generation is bumped so in-flight responses are discarded.
    pub fn reset(&mut self) {
        self.clear_outcome();
        self.status = RetrievalStatus::Idle;
        self.code = None;
        self.generation += 1;
        self.touch();
    }

    /// Returns the URL of openable content, if any.
    #[must_use]
    pub fn openable_target(&self) -> Option<(ContentKind, &str)> {
        let kind = self.classification.filter(|kind| kind.is_openable())?;
        let record = self.record.as_ref()?;
        Some((kind, record.content.trim()))
    }

    fn display(&mut self, record: SnippetRecord, auto_open_seconds: u32) {
        let kind = classify(&record.content);
        self.status = RetrievalStatus::Displaying;
        self.classification = Some(kind);
        self.countdown = kind.is_openable().then_some(auto_open_seconds);
        self.record = Some(record);
        self.error = None;
        self.password_error = None;
    }

    fn fail(&mut self, message: String) {
        self.clear_outcome();
        self.status = RetrievalStatus::Failed;
        self.code = None;
        self.error = Some(message);
        self.touch();
    }

    fn clear_outcome(&mut self) {
        self.record = None;
        self.protection = ProtectionState::Unknown;
        self.classification = None;
        self.countdown = None;
        self.error = None;
        self.password_error = None;
        self.viewer_open = false;
    }
}
