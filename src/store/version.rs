//! Version (entity tag) derivation
//!
//! A version is the xxh3 64-bit hash of the payload. Zero is reserved as
//! "no version", and an update must not reuse the version it replaces; in
//! either case the payload is rehashed with the next seed.

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Sentinel meaning "no version": create on put, no precondition on get
pub const UNVERSIONED: u64 = 0;

/// Version assigned when `payload` creates a new key
pub fn version_of(payload: &[u8]) -> u64 {
    next_version(payload, None)
}

/// Version for a write of `payload` replacing a record at version `replaced`
pub fn next_version(payload: &[u8], replaced: Option<u64>) -> u64 {
    let mut seed = 0u64;
    loop {
        let candidate = xxh3_64_with_seed(payload, seed);
        if candidate != UNVERSIONED && Some(candidate) != replaced {
            return candidate;
        }
        seed = seed.wrapping_add(1);
    }
}
