//! User-facing notices.
//!
//! The session reports outcomes through an injected [`Notifier`] instead of
//! reaching for a global toast or console.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// Something worked.
    Success,
    /// Something failed.
    Error,
    /// Neutral information.
    Info,
}

/// Sink for user-facing notices.
pub trait Notifier: Send + Sync {
    /// Shows a notice. Must not fail.
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// A [`Notifier`] that writes notices to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => error!(notice = message, "Notice"),
            NoticeKind::Success | NoticeKind::Info => info!(?kind, notice = message, "Notice"),
        }
    }
}
