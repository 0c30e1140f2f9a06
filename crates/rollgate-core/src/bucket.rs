//! Deterministic device bucketing for staged rollouts.
//!
//! A device's bucket is a pure function of its identifier bytes: SHA-256,
//! first four digest bytes read as a big-endian `u32` (the first eight hex
//! characters), reduced modulo 100. There is no salt or per-process seed, so
//! a device keeps its rollout membership across restarts and across
//! implementations in other languages.

use sha2::{Digest, Sha256};

/// Number of buckets devices are spread over.
pub const BUCKET_COUNT: u32 = 100;

/// Map a device identifier to a bucket in `[0, 100)`.
pub fn bucket(device_id: &str) -> u8 {
    let digest = Sha256::digest(device_id.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    // Always < 100.
    (prefix % BUCKET_COUNT) as u8
}

/// Whether a device in `bucket` receives a release rolled out to
/// `rollout_percentage` percent of the fleet.
///
/// 100% is eligible unconditionally; values above 100 count as 100.
pub fn is_eligible(bucket: u8, rollout_percentage: u8) -> bool {
    if rollout_percentage >= 100 {
        return true;
    }
    bucket < rollout_percentage
}
