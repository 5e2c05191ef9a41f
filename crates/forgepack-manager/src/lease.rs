//! Liveness tracking for archive contents.
//!
//! Every handle given out by the manager carries a [`LeaseGuard`] that counts
//! against its archive. An archive with a non-zero count is in use and will
//! not be evicted.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use forgepack_pack2::Asset;

/// Count of live leases on one archive.
#[derive(Debug, Default)]
pub(crate) struct LeaseCounter(AtomicUsize);

impl LeaseCounter {
    #[inline]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Holds one count on an archive's lease counter for as long as it lives.
pub(crate) struct LeaseGuard {
    counter: Arc<LeaseCounter>,
}

impl LeaseGuard {
    pub fn new(counter: &Arc<LeaseCounter>) -> Self {
        counter.0.fetch_add(1, Ordering::AcqRel);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Clone for LeaseGuard {
    fn clone(&self) -> Self {
        Self::new(&self.counter)
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.counter.0.fetch_sub(1, Ordering::Release);
    }
}

/// An asset handed out by the [`Manager`](crate::Manager).
///
/// While a lease is alive its archive stays resident. Cloning a lease takes
/// another count; dropping the last one makes the archive evictable again.
/// Dereferences to [`Asset`].
#[derive(Clone)]
pub struct AssetLease {
    asset: Arc<Asset>,
    archive: usize,
    _guard: LeaseGuard,
}

impl AssetLease {
    pub(crate) fn new(asset: Arc<Asset>, archive: usize, counter: &Arc<LeaseCounter>) -> Self {
        Self {
            asset,
            archive,
            _guard: LeaseGuard::new(counter),
        }
    }

    /// Id of the archive the asset was read from.
    #[inline]
    pub fn archive_id(&self) -> usize {
        self.archive
    }
}

impl Deref for AssetLease {
    type Target = Asset;

    fn deref(&self) -> &Asset {
        &self.asset
    }
}

impl fmt::Debug for AssetLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetLease")
            .field("archive", &self.archive)
            .field("asset", &self.asset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use forgepack_pack2::AssetRecord;

    #[test]
    fn test_guard_counts() {
        let counter = Arc::new(LeaseCounter::default());

        let a = LeaseGuard::new(&counter);
        let b = a.clone();
        assert_eq!(counter.count(), 2);

        drop(a);
        assert_eq!(counter.count(), 1);
        drop(b);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_lease_counts_across_threads() {
        let counter = Arc::new(LeaseCounter::default());
        let asset = Arc::new(Asset::new(
            AssetRecord::default(),
            None,
            Bytes::from_static(b""),
        ));
        let lease = AssetLease::new(asset, 3, &counter);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lease = lease.clone();
                std::thread::spawn(move || {
                    assert_eq!(lease.archive_id(), 3);
                    drop(lease);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.count(), 1);
        drop(lease);
        assert_eq!(counter.count(), 0);
    }
}
