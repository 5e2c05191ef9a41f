//! Manager configuration.

/// Default number of load attempts when paging an archive in.
pub const DEFAULT_MAX_LOAD_ATTEMPTS: u32 = 3;

/// Settings for a [`Manager`](crate::Manager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound on the combined size of resident archive buffers.
    /// `None` leaves residency bounded only by the system allocator.
    pub memory_limit: Option<u64>,
    /// How many times paging-in reads an archive, evicting between tries,
    /// before giving up with `ResourceExhausted`.
    pub max_load_attempts: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            memory_limit: None,
            max_load_attempts: DEFAULT_MAX_LOAD_ATTEMPTS,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_limit(mut self, limit: Option<u64>) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Set the load attempt bound. Values below 1 are raised to 1.
    pub fn with_max_load_attempts(mut self, attempts: u32) -> Self {
        self.max_load_attempts = attempts.max(1);
        self
    }
}
