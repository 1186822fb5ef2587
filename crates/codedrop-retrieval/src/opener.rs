//! Content-open actions.
//!
//! Websites are handed to an external opener. PDFs go to the embedded
//! document viewer instead of being navigated to directly.

use tracing::info;

use crate::error::Result;

/// Opens retrieved content.
pub trait ContentOpener: Send + Sync {
    /// Opens a website outside the current view.
    ///
    /// # Errors
    ///
    /// Returns `OpenFailed` if the platform opener cannot be started.
    fn open_website(&self, url: &str) -> Result<()>;

    /// Shows a document in the embedded viewer.
    ///
    /// # Errors
    ///
    /// Returns `OpenFailed` if the viewer cannot be reached.
    fn open_document(&self, url: &str) -> Result<()>;
}

/// A [`ContentOpener`] that only logs what it would open.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOpener;

impl ContentOpener for LoggingOpener {
    fn open_website(&self, url: &str) -> Result<()> {
        info!(url, "Open website");
        Ok(())
    }

    fn open_document(&self, url: &str) -> Result<()> {
        info!(url, "Open document");
        Ok(())
    }
}
