//! Configuration types for the concurrent combinators

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent workers. Zero yields an empty pool.
    pub workers: usize,
    /// Capacity of the handoff channel feeding the workers
    pub queue_capacity: usize,
    /// Capacity of the results channel drained by the consumer
    pub results_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_workers(num_cpus::get())
    }
}

impl PoolConfig {
    /// A config with `workers` workers and channels sized to match.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: workers.max(1),
            results_capacity: workers.max(1),
        }
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn results_capacity(mut self, capacity: usize) -> Self {
        self.results_capacity = capacity;
        self
    }

    /// Tokio channels reject a zero capacity, so both are raised to at least 1.
    pub(crate) fn normalized(self) -> Self {
        Self {
            workers: self.workers,
            queue_capacity: self.queue_capacity.max(1),
            results_capacity: self.results_capacity.max(1),
        }
    }
}

/// Tee buffer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeeConfig {
    /// Initial capacity of the buffer shared by all branches
    pub initial_capacity: usize,
}

impl Default for TeeConfig {
    fn default() -> Self {
        Self { initial_capacity: 16 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_uses_available_cpus() {
        let config = PoolConfig::default();
        assert_eq!(config.workers, num_cpus::get());
        assert!(config.queue_capacity >= 1);
        assert!(config.results_capacity >= 1);
    }

    #[test]
    fn zero_workers_keeps_usable_capacities() {
        let config = PoolConfig::with_workers(0);
        assert_eq!(config.workers, 0);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.results_capacity, 1);
    }

    #[test]
    fn normalized_raises_zero_capacities() {
        let config = PoolConfig::with_workers(4)
            .queue_capacity(0)
            .results_capacity(0)
            .normalized();
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.results_capacity, 1);
    }
}
