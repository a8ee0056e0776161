//! Error type for token decoding.

use thiserror::Error;

/// A proxied token could not be turned back into a URL.
///
/// Decoding is partial: every variant here is a malformed token, which the
/// network edge reports as a client error (HTTP 400). An empty token is not an
/// error; it decodes to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// `%` not followed by two hex digits.
    #[error("malformed percent escape at byte {offset}")]
    MalformedEscape { offset: usize },
    /// Percent-decoded bytes are not valid UTF-8.
    #[error("decoded token is not valid UTF-8")]
    InvalidUtf8,
    /// Token length cannot be re-padded to a base64 quantum.
    #[error("invalid base64 padding (length {len})")]
    InvalidPadding { len: usize },
    /// Character outside the URL-safe base64 alphabet.
    #[error("invalid base64 token: {0}")]
    InvalidBase64(String),
}

impl DecodeError {
    /// HTTP status the edge answers with for this error.
    pub fn status(&self) -> u16 {
        400
    }
}
