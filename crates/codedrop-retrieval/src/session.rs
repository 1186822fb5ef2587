//! The retrieval session.
//!
//! [`RetrievalSession`] drives one user's path from a 4-digit code to
//! displayed content. It owns the [`RetrievalState`], the single auto-open
//! [`Countdown`], and talks to its collaborators through injected
//! capabilities: the [`SnippetApi`], the [`DeepLink`], the [`ContentOpener`]
//! and the [`Notifier`].
//!
//! Locking: the state mutex is never held across an `.await`, and
//! collaborators are called after the lock is released. Timer callbacks hold a
//! weak reference and check the request generation before touching anything.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use codedrop_retrieval::{Config, HttpSnippetClient, RetrievalSession};
//!
//! # async fn example() -> codedrop_retrieval::Result<()> {
//! let config = Config::load()?;
//! let client = HttpSnippetClient::new(&config.api_base_url, config.request_timeout())?;
//! let session = RetrievalSession::new(config, Arc::new(client))?;
//!
//! let mut events = session.subscribe();
//! session.submit_code("1234").await?;
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::access_code::{sanitize_code_input, AccessCode, CODE_LENGTH};
use crate::classify::{parse_absolute_url, ContentKind};
use crate::client::{CodeLookup, SnippetApi};
use crate::config::Config;
use crate::countdown::Countdown;
use crate::deep_link::{DeepLink, UrlDeepLink};
use crate::error::{CodedropError, Result};
use crate::events::{EventBroadcaster, RetrievalEvent};
use crate::notify::{NoticeKind, Notifier, TracingNotifier};
use crate::opener::{ContentOpener, LoggingOpener};
use crate::snippet::SnippetRecord;
use crate::state::{RetrievalState, RetrievalStatus, INVALID_PASSWORD_MESSAGE};

/// Drives snippet retrieval for one user.
pub struct RetrievalSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: Config,
    api: Arc<dyn SnippetApi>,
    deep_link: Arc<dyn DeepLink>,
    opener: Arc<dyn ContentOpener>,
    notifier: Arc<dyn Notifier>,
    events: EventBroadcaster,
    shared: Mutex<Shared>,
}

struct Shared {
    state: RetrievalState,
    countdown: Option<Countdown>,
}

impl Shared {
    /// Stops the countdown. Returns `true` if one was running.
    fn stop_countdown(&mut self) -> bool {
        self.state.countdown = None;
        self.countdown.take().is_some_and(|mut countdown| {
            let running = countdown.is_running();
            countdown.cancel();
            running
        })
    }
}

impl RetrievalSession {
    /// Creates a session whose deep link is the configured app URL.
    ///
    /// Content is opened by [`LoggingOpener`] and notices go to
    /// [`TracingNotifier`] until replaced with the `with_*` builders.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if `config` fails [`Config::validate`],
    /// or `InvalidUrl` if `appUrl` cannot be parsed.
    pub fn new(config: Config, api: Arc<dyn SnippetApi>) -> Result<Self> {
        config.validate()?;
        let deep_link = Arc::new(UrlDeepLink::parse(&config.app_url)?);
        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                api,
                deep_link,
                opener: Arc::new(LoggingOpener),
                notifier: Arc::new(TracingNotifier),
                events: EventBroadcaster::default(),
                shared: Mutex::new(Shared {
                    state: RetrievalState::new(),
                    countdown: None,
                }),
            }),
        })
    }

    /// Replaces the deep link. Call before the session is used.
    #[must_use]
    pub fn with_deep_link(mut self, deep_link: Arc<dyn DeepLink>) -> Self {
        self.configure(|inner| inner.deep_link = deep_link);
        self
    }

    /// Replaces the content opener. Call before the session is used.
    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn ContentOpener>) -> Self {
        self.configure(|inner| inner.opener = opener);
        self
    }

    /// Replaces the notifier. Call before the session is used.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.configure(|inner| inner.notifier = notifier);
        self
    }

    fn configure(&mut self, apply: impl FnOnce(&mut SessionInner)) {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => apply(inner),
            None => warn!("Session already in use; collaborator not replaced"),
        }
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RetrievalEvent> {
        self.inner.events.subscribe()
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> RetrievalState {
        self.inner.lock().state.clone()
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Starts retrieval for a valid `?code=` deep link.
    ///
    /// Returns `Ok(None)` without doing anything when the deep link is absent
    /// or malformed.
    pub async fn start_from_deep_link(&self) -> Result<Option<RetrievalStatus>> {
        match self.inner.deep_link.initial_code() {
            Some(code) => {
                info!(code = %code, "Starting retrieval from deep link");
                self.fetch(code).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Submits a code typed by the user.
    ///
    /// Anything but exactly four digits raises an error notice and performs no
    /// network call. Returns the status reached once the lookup settles.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAccessCode` for malformed input and
    /// `InvalidStateTransition` if another code is still being validated.
    pub async fn submit_code(&self, input: &str) -> Result<RetrievalStatus> {
        let code = match AccessCode::parse(input) {
            Ok(code) => code,
            Err(e) => {
                self.inner.notifier.notify(NoticeKind::Error, &e.to_string());
                return Err(e);
            }
        };
        self.fetch(code).await
    }

    /// Handles raw keystrokes in the code field.
    ///
    /// Non-digits are dropped and input is capped at four digits; a complete
    /// code starts retrieval right away. Returns the sanitized field value and
    /// the status reached if a retrieval ran.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if another code is still being validated.
    pub async fn enter_code_input(&self, raw: &str) -> Result<(String, Option<RetrievalStatus>)> {
        let value = sanitize_code_input(raw);
        if value.len() < CODE_LENGTH {
            return Ok((value, None));
        }
        let code = AccessCode::parse(&value)?;
        let status = self.fetch(code).await?;
        Ok((value, Some(status)))
    }

    /// Submits the password for a protected snippet.
    ///
    /// A rejected password keeps the prompt open with a local error and
    /// leaves the code in place. Returns the status reached.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless a password prompt is pending.
    pub async fn submit_password(&self, password: &str) -> Result<RetrievalStatus> {
        let (generation, code) = {
            let mut shared = self.inner.lock();
            let from = shared.state.status;
            let code = shared
                .state
                .code
                .clone()
                .ok_or_else(|| CodedropError::invalid_transition(from, RetrievalStatus::Verifying))?;
            let generation = shared.state.begin_verification()?;
            self.inner
                .emit(RetrievalEvent::status_changed(from, RetrievalStatus::Verifying));
            (generation, code)
        };

        let result = self.inner.api.fetch_with_password(&code, password).await;
        Ok(self.inner.finish_verification(generation, &code, result))
    }

    /// Dismisses the password prompt, returning to idle.
    pub fn cancel_password_prompt(&self) {
        debug!("Password prompt cancelled");
        self.reset();
    }

    /// Stops the auto-open countdown without opening anything.
    ///
    /// Returns `true` if a countdown was running.
    pub fn cancel_auto_open(&self) -> bool {
        let cancelled = self.inner.lock().stop_countdown();
        if cancelled {
            info!("Auto-open cancelled");
            self.inner.emit(RetrievalEvent::CountdownCancelled);
        }
        cancelled
    }

    /// Opens the displayed content now.
    ///
    /// Any running countdown is stopped first so the content opens once.
    /// Returns `false` if nothing openable is displayed.
    pub fn open_content(&self) -> bool {
        let target = {
            let mut shared = self.inner.lock();
            let target = shared
                .state
                .openable_target()
                .map(|(kind, url)| (kind, url.to_string()));
            if target.is_some() {
                shared.stop_countdown();
            }
            target
        };
        match target {
            Some((kind, url)) => {
                self.inner.open(kind, &url);
                true
            }
            None => false,
        }
    }

    /// Returns to idle from any state.
    ///
    /// Cancels the countdown, clears all retrieval data, strips the code from
    /// the deep link, and makes any in-flight response stale.
    pub fn reset(&self) {
        let from = {
            let mut shared = self.inner.lock();
            shared.stop_countdown();
            let from = shared.state.status;
            shared.state.reset();
            from
        };
        self.inner.deep_link.clear_code();
        info!(from = %from, "Session reset");
        if from != RetrievalStatus::Idle {
            self.inner
                .emit(RetrievalEvent::status_changed(from, RetrievalStatus::Idle));
        }
        self.inner.emit(RetrievalEvent::Reset);
    }

    async fn fetch(&self, code: AccessCode) -> Result<RetrievalStatus> {
        let generation = {
            let mut shared = self.inner.lock();
            let from = shared.state.status;
            shared.state.begin_validation(code.clone())?;
            // No tick from the old record may be observed once a fetch begins.
            if shared.stop_countdown() {
                self.inner.emit(RetrievalEvent::CountdownCancelled);
            }
            let generation = shared.state.begin_fetch()?;
            self.inner
                .emit(RetrievalEvent::status_changed(from, RetrievalStatus::Fetching));
            generation
        };

        info!(code = %code, generation, "Fetching snippet");
        let result = self.inner.api.fetch_by_code(&code).await;
        Ok(self.inner.finish_lookup(generation, &code, result))
    }
}

impl Drop for RetrievalSession {
    fn drop(&mut self) {
        self.inner.lock().stop_countdown();
    }
}

impl std::fmt::Debug for RetrievalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalSession")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Result handling
// ============================================================================

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RetrievalEvent) {
        self.events.send(event);
    }

    fn finish_lookup(
        self: &Arc<Self>,
        generation: u64,
        code: &AccessCode,
        result: Result<CodeLookup>,
    ) -> RetrievalStatus {
        let mut shared = self.lock();
        match result {
            Ok(lookup) => {
                if !shared
                    .state
                    .apply_lookup(generation, lookup, self.config.auto_open_seconds)
                {
                    debug!(code = %code, generation, "Discarding stale lookup");
                    return shared.state.status;
                }
                let status = shared.state.status;
                self.emit(RetrievalEvent::status_changed(RetrievalStatus::Fetching, status));
                if status == RetrievalStatus::ProtectionPending {
                    info!(code = %code, "Snippet is password protected");
                    drop(shared);
                    self.emit(RetrievalEvent::ProtectionRequired);
                    return status;
                }
                self.on_displayed(shared, code);
                status
            }
            Err(e) => {
                let message = e.to_string();
                if !shared.state.apply_failure(generation, message.as_str()) {
                    debug!(code = %code, generation, "Discarding stale failure");
                    return shared.state.status;
                }
                drop(shared);
                self.on_failed(RetrievalStatus::Fetching, code, &e, message);
                RetrievalStatus::Failed
            }
        }
    }

    fn finish_verification(
        self: &Arc<Self>,
        generation: u64,
        code: &AccessCode,
        result: Result<SnippetRecord>,
    ) -> RetrievalStatus {
        let mut shared = self.lock();
        match result {
            Ok(record) => {
                if !shared
                    .state
                    .apply_verified(generation, record, self.config.auto_open_seconds)
                {
                    debug!(code = %code, generation, "Discarding stale verification");
                    return shared.state.status;
                }
                self.emit(RetrievalEvent::status_changed(
                    RetrievalStatus::Verifying,
                    RetrievalStatus::Displaying,
                ));
                self.on_displayed(shared, code);
                RetrievalStatus::Displaying
            }
            Err(e) if e.is_recoverable() => {
                if !shared.state.apply_password_rejected(generation) {
                    return shared.state.status;
                }
                drop(shared);
                warn!(code = %code, "Password rejected");
                self.emit(RetrievalEvent::status_changed(
                    RetrievalStatus::Verifying,
                    RetrievalStatus::ProtectionPending,
                ));
                self.emit(RetrievalEvent::password_rejected(INVALID_PASSWORD_MESSAGE));
                RetrievalStatus::ProtectionPending
            }
            Err(e) => {
                let message = e.to_string();
                if !shared
                    .state
                    .apply_verification_failure(generation, message.as_str())
                {
                    return shared.state.status;
                }
                drop(shared);
                self.on_failed(RetrievalStatus::Verifying, code, &e, message);
                RetrievalStatus::Failed
            }
        }
    }

    /// Publishes a displayed record and arms the countdown when openable.
    fn on_displayed(self: &Arc<Self>, mut shared: MutexGuard<'_, Shared>, code: &AccessCode) {
        if let (Some(record), Some(kind)) = (&shared.state.record, shared.state.classification) {
            self.emit(RetrievalEvent::retrieved(code.clone(), record.clone(), kind));
        }

        // Ticks need the lock, so they always follow the retrieved event.
        let countdown = shared.state.countdown;
        if let Some(seconds) = countdown {
            let generation = shared.state.generation;
            shared.countdown = Some(self.start_countdown(generation, seconds));
        }
        drop(shared);

        info!(code = %code, countdown = ?countdown, "Snippet retrieved");
        self.deep_link.set_code(code);
    }

    fn on_failed(&self, from: RetrievalStatus, code: &AccessCode, error: &CodedropError, message: String) {
        warn!(code = %code, kind = %error.kind(), error = %message, "Retrieval failed");
        self.emit(RetrievalEvent::status_changed(from, RetrievalStatus::Failed));
        if error.clears_deep_link() {
            self.deep_link.clear_code();
        }
        self.notifier.notify(NoticeKind::Error, &message);
        self.emit(RetrievalEvent::failed(message));
    }

    fn start_countdown(self: &Arc<Self>, generation: u64, seconds: u32) -> Countdown {
        let on_tick = {
            let weak = Arc::downgrade(self);
            move |remaining: u32| {
                if let Some(inner) = weak.upgrade() {
                    inner.countdown_tick(generation, remaining);
                }
            }
        };
        let on_complete = {
            let weak: Weak<Self> = Arc::downgrade(self);
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.countdown_complete(generation);
                }
            }
        };
        Countdown::start(seconds, self.config.tick_interval(), on_tick, on_complete)
    }

    fn countdown_tick(&self, generation: u64, remaining: u32) {
        {
            let mut shared = self.lock();
            if !shared.state.is_current(generation) || shared.countdown.is_none() {
                return;
            }
            shared.state.countdown = Some(remaining);
        }
        self.emit(RetrievalEvent::countdown_tick(remaining));
    }

    fn countdown_complete(&self, generation: u64) {
        let target = {
            let mut shared = self.lock();
            if !shared.state.is_current(generation) || shared.countdown.is_none() {
                return;
            }
            // Dropping our own handle is fine: the task has no work left.
            shared.countdown = None;
            shared.state.countdown = None;
            shared
                .state
                .openable_target()
                .map(|(kind, url)| (kind, url.to_string()))
        };
        if let Some((kind, url)) = target {
            self.open(kind, &url);
        }
    }

    /// Runs the content-open action for `url`.
    fn open(&self, kind: ContentKind, url: &str) {
        if parse_absolute_url(url).is_none() {
            let message = CodedropError::invalid_url(url).to_string();
            self.notifier.notify(NoticeKind::Error, &message);
            return;
        }

        let opened = match kind {
            ContentKind::Pdf => self.opener.open_document(url).map(|()| {
                self.lock().state.viewer_open = true;
            }),
            ContentKind::Website | ContentKind::Other => self.opener.open_website(url),
        };

        match opened {
            Ok(()) => {
                info!(kind = %kind, url, "Content opened");
                self.emit(RetrievalEvent::content_opened(kind, url));
            }
            Err(e) => {
                warn!(kind = %kind, url, error = %e, "Failed to open content");
                self.notifier.notify(NoticeKind::Error, &e.to_string());
            }
        }
    }
}
