use serde::{Deserialize, Serialize};

/// `bus.*` configuration options (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BusConfig {
    /// Number of worker tasks per pool (events, commands, queries each get
    /// their own set of `num_workers` workers).
    pub num_workers: usize,
    /// Count of priority groups per worker pool; together with
    /// `num_workers` this sizes the per-worker backpressure capacity
    /// (`num_workers * priority_groups` in-flight messages per worker).
    pub priority_groups: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            priority_groups: 4,
        }
    }
}

impl BusConfig {
    pub(crate) fn queue_capacity(&self) -> usize {
        (self.num_workers * self.priority_groups).max(1)
    }
}
