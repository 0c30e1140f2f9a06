//! rollgate-storage — object store access for published release artifacts.
//!
//! Release artifacts live in a bucket-like tree:
//!
//! ```text
//! app/1.2.0/app.bin
//! app/1.2.0/app.bin.sha256
//! app/1.3.0/skus/mk2/app.bin
//! app/1.3.0/skus/mk2/app.bin.sha256
//! ```
//!
//! The release engine only needs folder listing, existence probes and
//! streamed reads, expressed by the [`ObjectStore`] trait. Two backends are
//! provided: [`MemoryStore`] for tests and demos, [`FilesystemStore`] for a
//! directory mirroring the bucket.

pub mod error;
pub mod filesystem;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use traits::{ByteStream, ObjectStore, collect_stream, validate_key};
