//! Engine configuration.

use quiver_query::ExecutionConfig;

/// Tunables of a Quiver deployment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Poll interval, in milliseconds, while waiting for remote pull
    /// results.
    pub remote_pull_sleep_ms: u64,
    /// Rows per remote-pull batch.
    pub pull_batch_size: usize,
    /// Planner heuristic: below this vertex count an existing-node
    /// match is planned as scan+expand instead of double-scan+filter.
    pub vertex_count_to_expand_existing: i64,
    /// Selects the cost-based planner over the rule-based one.
    pub use_cost_planner: bool,
    /// Lifetime of a cached prepared plan, in seconds; zero disables
    /// caching.
    pub plan_cache_ttl_sec: u64,
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            remote_pull_sleep_ms: 1,
            pull_batch_size: 20,
            vertex_count_to_expand_existing: 10,
            use_cost_planner: true,
            plan_cache_ttl_sec: 60,
        }
    }

    /// Sets the remote pull poll interval.
    #[must_use]
    pub const fn with_remote_pull_sleep_ms(mut self, ms: u64) -> Self {
        self.remote_pull_sleep_ms = ms;
        self
    }

    /// Sets the plan cache lifetime.
    #[must_use]
    pub const fn with_plan_cache_ttl_sec(mut self, seconds: u64) -> Self {
        self.plan_cache_ttl_sec = seconds;
        self
    }

    /// The per-execution slice of the configuration.
    #[must_use]
    pub const fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            remote_pull_sleep_ms: self.remote_pull_sleep_ms,
            batch_size: self.pull_batch_size,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
