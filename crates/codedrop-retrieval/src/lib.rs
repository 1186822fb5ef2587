//! Codedrop Snippet Retrieval
//!
//! Turns a 4-digit access code into displayed content: talks to the snippet
//! API, runs the retrieval state machine and its auto-open countdown, and
//! hosts the embedded document viewer for PDFs.

pub mod access_code;
pub mod classify;
pub mod client;
pub mod config;
pub mod countdown;
pub mod deep_link;
pub mod error;
pub mod events;
pub mod frame;
pub mod notify;
pub mod opener;
pub mod session;
pub mod snippet;
pub mod state;
pub mod viewer;

pub use access_code::{sanitize_code_input, AccessCode, CODE_LENGTH};
pub use classify::{classify, ContentKind};
pub use client::{CodeLookup, HttpSnippetClient, SnippetApi};
pub use config::{Config, ViewerConfig};
pub use countdown::Countdown;
pub use deep_link::{DeepLink, HistoryEntry, HistoryOp, UrlDeepLink};
pub use error::{CodedropError, Result, RetrievalErrorKind};
pub use events::{EventBroadcaster, RetrievalEvent};
pub use frame::{HttpDownloader, HttpFrame};
pub use notify::{NoticeKind, Notifier, TracingNotifier};
pub use opener::{ContentOpener, LoggingOpener};
pub use session::RetrievalSession;
pub use snippet::{
    CreatedSnippet, ExpirationDays, NewSnippet, SnippetContentType, SnippetRecord,
    MIN_PASSWORD_LENGTH,
};
pub use state::{ProtectionState, RetrievalState, RetrievalStatus};
pub use viewer::{
    DocumentViewer, Downloader, FallbackAction, FrameDocument, FrameEvent, FrameHost, PageScroll,
    ScrollGuard, ScrollLock, ViewerLoadState,
};
