//! Credential cookie extraction.
//!
//! One pure function shared by the ordinary request path and the raw
//! upgrade handshake — upgrade handshakes bypass normal request
//! middleware, so this must not depend on any of it.

use gate_core::{COOKIE_SECRET_TOKEN, COOKIE_USERNAME};
use hyper::header::{HeaderMap, COOKIE};

/// Extract the `(username, secret-token)` cookie pair from request
/// headers. Empty values count as absent. Later occurrences win, matching
/// how user agents order cookies by specificity.
pub fn parse_credential_cookies(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let mut username = None;
    let mut secret = None;

    for value in headers.get_all(COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            let Some((name, value)) = pair.split_once('=') else { continue };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match name.trim() {
                COOKIE_USERNAME => username = Some(value.to_string()),
                COOKIE_SECRET_TOKEN => secret = Some(value.to_string()),
                _ => {}
            }
        }
    }

    (username, secret)
}
