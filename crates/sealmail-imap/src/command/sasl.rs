//! SASL initial responses.
//!
//! - PLAIN (RFC 4616), sent as a continuation chunk after
//!   `AUTHENTICATE PLAIN`
//! - XOAUTH2 (Google/Microsoft), sent inline as the initial response

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Generates the PLAIN response: `\0<username>\0<password>`, base64 encoded.
///
/// The authorization identity is left empty (same as the authentication
/// identity).
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}").as_bytes())
}

/// Generates the XOAUTH2 token:
/// `user=<user>\x01auth=Bearer <token>\x01\x01`, base64 encoded.
///
/// # Example
///
/// ```
/// use sealmail_imap::command::xoauth2_token;
///
/// let token = xoauth2_token("user@example.com", "ya29.a0");
/// assert!(!token.contains('\x01'));
/// ```
#[must_use]
pub fn xoauth2_token(user: &str, token: &str) -> String {
    STANDARD.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01").as_bytes())
}
