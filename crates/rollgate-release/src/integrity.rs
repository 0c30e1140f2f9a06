//! Integrity verifier — artifact bytes against their published digest.
//!
//! The artifact and its `.sha256` file are two independent remote reads with
//! no atomic multi-object get, so a torn read or a digest left behind by a
//! partial publish can only be caught here.

use futures::StreamExt;
use rollgate_core::digest::normalize_digest_text;
use rollgate_storage::ByteStream;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{ReleaseError, ReleaseResult};

/// Hash a streamed artifact and compare it with `expected_digest_text`.
///
/// On mismatch, returns `Err(IntegrityFailure)` carrying `fail_reason` when
/// one is given, otherwise `Ok(false)`.
pub async fn verify_stream(
    mut artifact: ByteStream,
    expected_digest_text: &str,
    fail_reason: Option<&str>,
) -> ReleaseResult<bool> {
    let mut hasher = Sha256::new();
    while let Some(chunk) = artifact.next().await {
        let chunk = chunk.map_err(|e| ReleaseError::upstream("reading artifact", e))?;
        hasher.update(&chunk);
    }
    let actual = hex::encode(hasher.finalize());
    let expected = normalize_digest_text(expected_digest_text);
    if !expected.is_empty() && actual == expected {
        return Ok(true);
    }
    warn!(%expected, %actual, "artifact digest mismatch");
    match fail_reason {
        Some(reason) => Err(ReleaseError::IntegrityFailure {
            reason: reason.to_string(),
            expected,
            actual,
        }),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rollgate_core::digest::sha256_hex;
    use rollgate_storage::{StorageError, StorageResult};

    fn stream_of(chunks: &[&str]) -> ByteStream {
        let items: Vec<StorageResult<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn matching_digest_passes() {
        let digest = sha256_hex(b"firmware-bytes");
        let ok = verify_stream(stream_of(&["firmware-", "bytes"]), &digest, None)
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn surrounding_whitespace_and_case_are_ignored() {
        let digest = format!("  {}\n", sha256_hex(b"abc").to_uppercase());
        assert!(verify_stream(stream_of(&["abc"]), &digest, Some("x")).await.unwrap());
    }

    #[tokio::test]
    async fn mismatch_without_reason_returns_false() {
        let digest = sha256_hex(b"something else");
        let ok = verify_stream(stream_of(&["abc"]), &digest, None).await.unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn mismatch_with_reason_is_fatal() {
        let digest = sha256_hex(b"something else");
        let err = verify_stream(stream_of(&["abc"]), &digest, Some("app 1.0.0 corrupt"))
            .await
            .unwrap_err();
        match err {
            ReleaseError::IntegrityFailure { reason, expected, actual } => {
                assert_eq!(reason, "app 1.0.0 corrupt");
                assert_eq!(expected, digest);
                assert_eq!(actual, sha256_hex(b"abc"));
            }
            other => panic!("expected integrity failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_digest_never_matches() {
        assert!(!verify_stream(stream_of(&[]), "", None).await.unwrap());
        assert!(verify_stream(stream_of(&[""]), "\n", Some("empty digest")).await.is_err());
    }

    #[tokio::test]
    async fn read_errors_are_upstream_failures() {
        let items: Vec<StorageResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(StorageError::Backend("reset".to_string())),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(items));
        let err = verify_stream(stream, &sha256_hex(b"abc"), Some("x")).await.unwrap_err();
        assert!(matches!(err, ReleaseError::Upstream { .. }));
    }
}
