//! Request signing.
//!
//! Every request carries an `Authorization` header of the form
//! `NIMBUS.IO {auth_key_id}:{signature}` and the Unix timestamp the
//! signature was computed for in `x-nimbus-io-timestamp`. The signature is
//! the hex-encoded HMAC-SHA256, keyed by the auth key, of
//! `{user_name}\n{METHOD}\n{timestamp}\n{path_and_query}`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Authorization scheme name.
pub const AUTHORIZATION_SCHEME: &str = "NIMBUS.IO";

/// Header carrying the signing timestamp.
pub const TIMESTAMP_HEADER: &str = "x-nimbus-io-timestamp";

/// Computes the request signature.
pub fn compute_signature(
    credentials: &Credentials,
    method: &str,
    timestamp: i64,
    path_and_query: &str,
) -> String {
    let message = format!(
        "{}\n{}\n{}\n{}",
        credentials.user_name(),
        method,
        timestamp,
        path_and_query
    );

    let mut mac = HmacSha256::new_from_slice(credentials.auth_key().as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}

/// Formats the `Authorization` header value.
pub fn authorization_value(credentials: &Credentials, signature: &str) -> String {
    format!(
        "{AUTHORIZATION_SCHEME} {}:{signature}",
        credentials.auth_key_id()
    )
}
