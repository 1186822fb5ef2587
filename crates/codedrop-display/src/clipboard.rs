//! Clipboard copy through the system clipboard.
//!
//! Copy failures never interrupt display: [`copy_or_warn`] logs and moves on.

use tracing::{debug, warn};

use crate::{DisplayError, Result};

impl From<arboard::Error> for DisplayError {
    fn from(err: arboard::Error) -> Self {
        Self::Clipboard(err.to_string())
    }
}

/// Copies `text` to the system clipboard.
///
/// # Errors
///
/// Returns `DisplayError::Clipboard` if the clipboard cannot be opened or
/// refuses the text.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text)?;
    debug!(bytes = text.len(), "Copied to clipboard");
    Ok(())
}

/// Copies `text`, logging a warning instead of failing.
///
/// Returns `true` if the text reached the clipboard.
pub fn copy_or_warn(text: &str) -> bool {
    match copy_to_clipboard(text) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to copy content");
            false
        }
    }
}
