//! rollgate-state — persisted release store.
//!
//! Backed by [redb](https://docs.rs/redb), holds one [`PersistedRelease`]
//! row per `(version, kind)` with its rollout percentage.
//!
//! # Architecture
//!
//! Rows are JSON-serialized into redb's `&[u8]` value columns under the
//! composite key `{kind}:{version}`, which enforces the one-row-per-pair
//! invariant and allows prefix scans per kind.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. redb serializes write
//! transactions, so the create-if-absent upsert is atomic.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
