//! Percent-encoding compatible with JavaScript's `encodeURIComponent`.
//!
//! The provider verifies both the CheckMacValue and the invoice envelopes
//! against that exact escaping, so the unreserved set below must not change.

use crate::error::{GatewayError, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

pub fn decode_uri_component(input: &str) -> Result<String> {
    match percent_decode_str(input).decode_utf8() {
        Ok(decoded) => Ok(decoded.into_owned()),
        Err(e) => {
            let message = format!("percent-decoded text is not UTF-8: {e}");
            Err(GatewayError::Decrypt(message))
        }
    }
}
