//! rollgate-release — release resolution and staged rollout.
//!
//! Decides which app and system artifact each device should run, from the
//! versions published in object storage and the rollout percentages held in
//! the release store.
//!
//! # Components
//!
//! - **`resolver`** — SKU partition vs legacy artifact path policy
//! - **`lister`** — latest satisfying version of a kind, with digest and URL
//! - **`integrity`** — streamed SHA-256 verification against published digests
//! - **`cache`** — TTL/LRU memoization of metadata and redirect targets
//! - **`orchestrator`** — per-device decisions and operator controls

pub mod cache;
pub mod error;
pub mod integrity;
pub mod lister;
pub mod orchestrator;
pub mod resolver;

pub use cache::{CacheKey, CacheStats, ReleaseCache};
pub use error::{ReleaseError, ReleaseResult};
pub use integrity::verify_stream;
pub use lister::VersionLister;
pub use orchestrator::{RedirectQuery, ReleaseQuery, Releases};
pub use resolver::ArtifactResolver;
