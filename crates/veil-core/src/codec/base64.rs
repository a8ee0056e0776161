//! URL-safe base64 tokens without retained padding.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use super::DecodeError;

pub(crate) fn encode_unpadded(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Re-pads `token` to a multiple of four and decodes it with the URL-safe alphabet.
pub(crate) fn decode_repadded(token: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = token.trim_end_matches('=');
    let padding = match trimmed.len() % 4 {
        0 => 0,
        2 => 2,
        3 => 1,
        _ => {
            return Err(DecodeError::InvalidPadding {
                len: trimmed.len(),
            })
        }
    };
    let mut padded = String::with_capacity(trimmed.len() + padding);
    padded.push_str(trimmed);
    padded.extend(std::iter::repeat('=').take(padding));
    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))
}
