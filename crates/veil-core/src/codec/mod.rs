//! Reversible URL ⇄ path-token codecs.
//!
//! Every strategy is a pure function pair: `encode` is total over any string
//! and `decode` is partial, failing with [`DecodeError`] on malformed input.
//! `decode(encode(s)) == s` holds for every strategy.

mod base64;
mod error;
mod percent;
mod xor;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use error::DecodeError;

/// Selects the token strategy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    /// Identity; tokens are the raw URL. Debugging only.
    None,
    /// Whole-URL percent encoding.
    Plain,
    /// XOR every other character, then percent encode.
    #[default]
    Xor,
    /// Percent encode, then URL-safe base64 without padding.
    Base64,
}

impl CodecId {
    pub const ALL: [CodecId; 4] = [CodecId::None, CodecId::Plain, CodecId::Xor, CodecId::Base64];

    pub fn as_str(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Plain => "plain",
            CodecId::Xor => "xor",
            CodecId::Base64 => "base64",
        }
    }

    pub fn encode(self, url: &str) -> String {
        match self {
            CodecId::None => url.to_string(),
            CodecId::Plain => percent::encode_component(url),
            CodecId::Xor => percent::encode_component(&xor::xor_alternate(url)),
            CodecId::Base64 => base64::encode_unpadded(percent::encode_component(url).as_bytes()),
        }
    }

    pub fn decode(self, token: &str) -> Result<String, DecodeError> {
        if token.is_empty() {
            return Ok(String::new());
        }
        match self {
            CodecId::None => Ok(token.to_string()),
            CodecId::Plain => percent::decode_component(token),
            CodecId::Xor => percent::decode_component(token).map(|s| xor::xor_alternate(&s)),
            CodecId::Base64 => {
                let bytes = base64::decode_repadded(token)?;
                let escaped = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
                percent::decode_component(&escaped)
            }
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CodecId::None),
            "plain" => Ok(CodecId::Plain),
            "xor" => Ok(CodecId::Xor),
            "base64" => Ok(CodecId::Base64),
            other => Err(format!(
                "unknown codec '{}' (expected none, plain, xor or base64)",
                other
            )),
        }
    }
}
