//! Per-key lock striping
//!
//! Conditional writes read the current version and then write; both steps
//! must happen under one critical section per key. Keys hash onto a fixed
//! set of mutexes, so unrelated keys rarely contend.

use parking_lot::{Mutex, MutexGuard};
use xxhash_rust::xxh3::xxh3_64;

pub(crate) struct KeyLocks {
    stripes: Box<[Mutex<()>]>,
}

impl KeyLocks {
    /// `stripes` is clamped to at least one
    pub(crate) fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    /// Block until the stripe owning `key` is held
    pub(crate) fn lock(&self, key: &[u8]) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(key)].lock()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.stripes.len()
    }

    fn stripe_of(&self, key: &[u8]) -> usize {
        (xxh3_64(key) % self.stripes.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_maps_to_same_stripe() {
        let locks = KeyLocks::new(16);
        assert_eq!(locks.stripe_of(b"alpha"), locks.stripe_of(b"alpha"));
        assert!(locks.stripe_of(b"beta") < 16);
    }

    #[test]
    fn test_zero_stripes_is_clamped() {
        let locks = KeyLocks::new(0);
        assert_eq!(locks.len(), 1);
        drop(locks.lock(b"any"));
    }
}
