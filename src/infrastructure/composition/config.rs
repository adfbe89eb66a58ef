use std::time::Duration;

/// Configuration for the composition cache
#[derive(Debug, Clone)]
pub struct CompositionCacheConfig {
    /// Maximum number of composed (non-base) models held at once
    pub capacity: usize,
    /// Idle time after which an unreferenced entry is swept
    pub ttl: Duration,
    /// How often the background sweep runs
    pub sweep_interval: Duration,
    /// How long a caller waits for an in-flight build before giving up
    pub wait_timeout: Duration,
}

impl Default for CompositionCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(30),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

impl CompositionCacheConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}
