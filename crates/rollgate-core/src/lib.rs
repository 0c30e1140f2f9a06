//! rollgate-core — shared types and pure release-selection logic.
//!
//! Everything in this crate is free of I/O: the semver gate that picks the
//! highest satisfying version, the deterministic device bucketer used for
//! staged rollouts, SHA-256 digest helpers, and the `rollgate.toml`
//! configuration model.

pub mod bucket;
pub mod config;
pub mod digest;
pub mod types;
pub mod version;

pub use bucket::{bucket, is_eligible};
pub use config::RollgateConfig;
pub use types::*;
pub use version::{SemverRange, max_satisfying};
