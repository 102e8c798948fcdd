//! Deterministic hashing helpers.
//!
//! The standard library hasher is randomly seeded per process, which would
//! make the seed offsets derived for named random number streams differ from
//! run to run. The xxh3 hash used here is stable across runs and platforms.

use xxhash_rust::xxh3::xxh3_64;

/// Computes a stable 64-bit hash of a `&str`.
///
/// Used to derive per-stream seed offsets from stream names in
/// `crate::random`.
#[must_use]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
