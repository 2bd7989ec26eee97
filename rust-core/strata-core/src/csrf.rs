//! # CSRF Protection
//!
//! POST requests must echo the session's token, either as the
//! `csrf_token` form field or in the `X-CSRF-TOKEN` header. A token in the
//! query string is ignored.

use crate::error::{Error, Result};
use crate::request::Request;
use crate::session::{Session, CSRF_SESSION_KEY};

/// Form field carrying the token
pub const TOKEN_FIELD: &str = "csrf_token";

/// Header carrying the token
pub const TOKEN_HEADER: &str = "x-csrf-token";

/// Check the token supplied by the client against its session
///
/// # Errors
///
/// Returns `Error::InvalidCsrfToken` when the client sent no token, the
/// session holds none, or the two differ.
pub fn verify(req: &Request) -> Result<()> {
    let supplied = req
        .form()
        .get(TOKEN_FIELD)
        .map(String::as_str)
        .or_else(|| req.header(TOKEN_HEADER))
        .filter(|t| !t.is_empty())
        .ok_or(Error::InvalidCsrfToken)?;
    let stored = req
        .session()
        .get(CSRF_SESSION_KEY)
        .ok_or(Error::InvalidCsrfToken)?;

    if constant_time_eq(stored.as_bytes(), supplied.as_bytes()) {
        Ok(())
    } else {
        Err(Error::InvalidCsrfToken)
    }
}

/// Hidden form input holding the session's token
#[must_use]
pub fn hidden_field(session: &Session) -> String {
    format!(
        r#"<input type="hidden" name="{TOKEN_FIELD}" value="{}">"#,
        session.csrf_token()
    )
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
