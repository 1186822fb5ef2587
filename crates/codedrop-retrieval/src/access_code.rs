//! The four-digit access code that addresses a snippet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodedropError, Result};

/// Number of digits in an access code.
pub const CODE_LENGTH: usize = 4;

/// A validated access code: exactly four ASCII digits.
///
/// The only way to obtain one is through [`AccessCode::parse`], so any
/// `AccessCode` that reaches the display layer has the right shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

impl AccessCode {
    /// Parses `input` as an access code.
    ///
    /// No trimming or digit filtering happens here; see [`sanitize_code_input`]
    /// for the lenient path used by interactive input.
    ///
    /// # Examples
    ///
    /// ```
    /// use codedrop_retrieval::AccessCode;
    ///
    /// assert!(AccessCode::parse("1234").is_ok());
    /// assert!(AccessCode::parse("123").is_err());
    /// assert!(AccessCode::parse("12a4").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        if Self::is_valid(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(CodedropError::invalid_code(input))
        }
    }

    /// Returns `true` if `input` is exactly four ASCII digits.
    #[must_use]
    pub fn is_valid(input: &str) -> bool {
        input.len() == CODE_LENGTH && input.bytes().all(|b| b.is_ascii_digit())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccessCode {
    type Error = CodedropError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AccessCode> for String {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}

/// Filters raw keyboard input down to at most four digits.
///
/// # Examples
///
/// ```
/// use codedrop_retrieval::sanitize_code_input;
///
/// assert_eq!(sanitize_code_input("12-34-56"), "1234");
/// assert_eq!(sanitize_code_input(" 9a"), "9");
/// ```
#[must_use]
pub fn sanitize_code_input(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(CODE_LENGTH)
        .collect()
}
