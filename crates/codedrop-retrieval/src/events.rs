//! Retrieval events and broadcasting.
//!
//! Every observable change of a [`RetrievalSession`](crate::RetrievalSession)
//! is published as a [`RetrievalEvent`] so front ends can render progress
//! without polling.
//!
//! # Event Types
//!
//! - `status_changed` - The session moved to a new status
//! - `retrieved` - A snippet record is ready for display
//! - `protection_required` - The snippet needs a password
//! - `password_rejected` - The password was wrong; the prompt stays open
//! - `countdown_tick` - Seconds left before auto-open
//! - `countdown_cancelled` - The countdown was stopped without opening
//! - `content_opened` - A website or document was opened
//! - `failed` - The attempt failed
//! - `reset` - The session returned to idle
//!
//! # Example
//!
//! ```no_run
//! use codedrop_retrieval::events::{EventBroadcaster, RetrievalEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(64);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(RetrievalEvent::countdown_tick(5));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::access_code::AccessCode;
use crate::classify::ContentKind;
use crate::snippet::SnippetRecord;
use crate::state::RetrievalStatus;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `status_changed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangedPayload {
    /// Previous status.
    pub from: RetrievalStatus,
    /// New status.
    pub to: RetrievalStatus,
}

/// Payload for the `retrieved` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedPayload {
    /// Code the record was retrieved with.
    pub code: AccessCode,
    /// The snippet.
    pub record: SnippetRecord,
    /// Classification of the snippet content.
    pub classification: ContentKind,
}

/// Payload for the `countdown_tick` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownTickPayload {
    /// Seconds left.
    pub remaining: u32,
}

/// Payload for the `content_opened` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentOpenedPayload {
    /// What was opened.
    pub kind: ContentKind,
    /// URL that was opened.
    pub url: String,
}

/// Payload for the `failed` and `password_rejected` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Human-readable message.
    pub message: String,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events published by a retrieval session.
///
/// Serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum RetrievalEvent {
    /// The session changed status.
    StatusChanged(StatusChangedPayload),
    /// A snippet is ready for display.
    Retrieved(RetrievedPayload),
    /// The snippet needs a password.
    ProtectionRequired,
    /// The password was rejected.
    PasswordRejected(MessagePayload),
    /// Countdown progress.
    CountdownTick(CountdownTickPayload),
    /// The countdown stopped without opening anything.
    CountdownCancelled,
    /// Content was opened.
    ContentOpened(ContentOpenedPayload),
    /// The attempt failed.
    Failed(MessagePayload),
    /// The session returned to idle.
    Reset,
}

impl RetrievalEvent {
    /// Creates a `status_changed` event.
    #[must_use]
    pub const fn status_changed(from: RetrievalStatus, to: RetrievalStatus) -> Self {
        Self::StatusChanged(StatusChangedPayload { from, to })
    }

    /// Creates a `retrieved` event.
    #[must_use]
    pub const fn retrieved(
        code: AccessCode,
        record: SnippetRecord,
        classification: ContentKind,
    ) -> Self {
        Self::Retrieved(RetrievedPayload {
            code,
            record,
            classification,
        })
    }

    /// Creates a `password_rejected` event.
    pub fn password_rejected(message: impl Into<String>) -> Self {
        Self::PasswordRejected(MessagePayload {
            message: message.into(),
        })
    }

    /// Creates a `countdown_tick` event.
    #[must_use]
    pub const fn countdown_tick(remaining: u32) -> Self {
        Self::CountdownTick(CountdownTickPayload { remaining })
    }

    /// Creates a `content_opened` event.
    pub fn content_opened(kind: ContentKind, url: impl Into<String>) -> Self {
        Self::ContentOpened(ContentOpenedPayload {
            kind,
            url: url.into(),
        })
    }

    /// Creates a `failed` event.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(MessagePayload {
            message: message.into(),
        })
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Fans retrieval events out to every subscriber.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<RetrievalEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster with the given per-subscriber buffer.
    ///
    /// Slow subscribers receive `Lagged` and miss older events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RetrievalEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event and returns how many subscribers will see it.
    pub fn send(&self, event: RetrievalEvent) -> usize {
        // Err only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
