//! Accounting for resident archive bytes.

use std::sync::atomic::{AtomicU64, Ordering};

const UNLIMITED: u64 = u64::MAX;

/// Tracks resident bytes against an optional limit.
#[derive(Debug)]
pub(crate) struct MemoryBudget {
    limit: AtomicU64,
    resident: AtomicU64,
}

impl MemoryBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit: AtomicU64::new(limit.unwrap_or(UNLIMITED)),
            resident: AtomicU64::new(0),
        }
    }

    pub fn limit(&self) -> Option<u64> {
        match self.limit.load(Ordering::Acquire) {
            UNLIMITED => None,
            limit => Some(limit),
        }
    }

    pub fn set_limit(&self, limit: Option<u64>) {
        self.limit.store(limit.unwrap_or(UNLIMITED), Ordering::Release);
    }

    pub fn resident(&self) -> u64 {
        self.resident.load(Ordering::Acquire)
    }

    /// Account for `bytes` more resident data.
    ///
    /// On refusal returns how many bytes would have to be freed first.
    pub fn try_reserve(&self, bytes: u64) -> Result<(), u64> {
        let limit = self.limit.load(Ordering::Acquire);
        let mut current = self.resident.load(Ordering::Acquire);

        loop {
            let wanted = current.saturating_add(bytes);
            if wanted > limit {
                return Err(wanted - limit);
            }
            match self.resident.compare_exchange_weak(
                current,
                wanted,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn release(&self, bytes: u64) {
        self.resident.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited() {
        let budget = MemoryBudget::new(None);
        assert_eq!(budget.limit(), None);
        assert!(budget.try_reserve(u64::MAX / 2).is_ok());
        assert!(budget.try_reserve(u64::MAX / 2).is_ok());
    }

    #[test]
    fn test_shortfall() {
        let budget = MemoryBudget::new(Some(100));
        assert!(budget.try_reserve(60).is_ok());
        assert_eq!(budget.try_reserve(50), Err(10));
        assert_eq!(budget.resident(), 60);

        budget.release(60);
        assert!(budget.try_reserve(100).is_ok());
        assert_eq!(budget.try_reserve(1), Err(1));
    }

    #[test]
    fn test_lowering_limit() {
        let budget = MemoryBudget::new(None);
        budget.try_reserve(80).unwrap();
        budget.set_limit(Some(50));

        assert_eq!(budget.limit(), Some(50));
        assert_eq!(budget.try_reserve(10), Err(40));
    }
}
