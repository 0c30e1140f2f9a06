//! SHA-256 digest helpers shared by the verifier and the bucketer's callers.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Normalize the text of a `.sha256` file for comparison.
///
/// Digest files are a single hex digest, but publishers sometimes append a
/// newline or use `sha256sum` output (`<digest>  <filename>`), so only the
/// first whitespace-separated token is kept.
pub fn normalize_digest_text(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Suffix of the digest file co-located with every artifact.
pub const DIGEST_SUFFIX: &str = ".sha256";

/// Object key of the digest file for an artifact key.
pub fn digest_key(artifact_key: &str) -> String {
    format!("{artifact_key}{DIGEST_SUFFIX}")
}
