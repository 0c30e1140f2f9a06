//! Object store trait.

use std::collections::BTreeSet;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::error::{StorageError, StorageResult};

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Read access to a bucket of published artifacts.
///
/// Listings may be eventually consistent; `exists`/`get` on a key that was
/// just listed are assumed to be strongly consistent.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Names of the immediate child "folders" under `prefix`.
    ///
    /// `prefix` ends with `/` (or is empty for the root). Returned names carry
    /// no trailing slash.
    async fn list_common_prefixes(&self, prefix: &str) -> StorageResult<BTreeSet<String>>;

    /// Whether any object key starts with `prefix`.
    async fn prefix_exists(&self, prefix: &str) -> StorageResult<bool>;

    /// Whether an object exists at exactly `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Fetch an object's full content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Fetch an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;
}

/// Drain a byte stream into one buffer.
pub async fn collect_stream(mut stream: ByteStream) -> StorageResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Reject keys that could escape the bucket root.
///
/// Keys are `/`-separated relative paths; empty segments, `.` and `..` are
/// refused. A trailing `/` (prefix form) is allowed.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let trimmed = key.strip_suffix('/').unwrap_or(key);
    if trimmed.is_empty() {
        return Ok(());
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_relative_keys_and_prefixes() {
        assert!(validate_key("app/1.0.0/app.bin").is_ok());
        assert!(validate_key("app/").is_ok());
        assert!(validate_key("").is_ok());
    }

    #[test]
    fn rejects_traversal() {
        for key in ["/etc/passwd", "app/../secrets", "app//x", "./app", "a\\b"] {
            assert!(
                matches!(validate_key(key), Err(StorageError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn collect_concatenates_chunks() {
        let chunks: Vec<StorageResult<Bytes>> =
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
        assert_eq!(collect_stream(stream).await.unwrap(), Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn collect_propagates_errors() {
        let chunks: Vec<StorageResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(StorageError::Backend("connection reset".to_string())),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
        assert!(collect_stream(stream).await.is_err());
    }
}
