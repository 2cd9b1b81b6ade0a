//! OVH request signing.

use sha1::{Digest, Sha1};

/// Computes the `X-Ovh-Signature` header value.
///
/// The signature is `$1$` followed by the hex SHA-1 of the application
/// secret, consumer key, method, full URL, body and timestamp joined by `+`.
pub(super) fn sign(
    application_secret: &str,
    consumer_key: &str,
    method: &str,
    url: &str,
    body: &str,
    timestamp: i64,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(
        format!("{application_secret}+{consumer_key}+{method}+{url}+{body}+{timestamp}")
            .as_bytes(),
    );
    format!("$1${}", hex::encode(hasher.finalize()))
}
