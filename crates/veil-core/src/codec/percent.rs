//! Component escaping and strict unescaping.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::DecodeError;

/// Everything except the RFC 3986 unreserved set `A-Z a-z 0-9 - _ . ~` is escaped.
/// Tokens must survive unquoted CSS `url()` and quoted JS strings.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Percent-decodes `s`, rejecting stray `%` and non-UTF-8 output.
///
/// `percent_encoding::percent_decode_str` passes malformed escapes through
/// untouched; tokens must fail loudly instead, so escapes are checked first.
pub(crate) fn decode_component(s: &str) -> Result<String, DecodeError> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(DecodeError::MalformedEscape { offset: i });
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_encoding::percent_decode_str(s)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .map_err(|_| DecodeError::InvalidUtf8)
}
