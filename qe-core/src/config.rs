//! Engine configuration, injected once at construction (§4.2, §9's "Global
//! `storage_tiers` ... configuration injected at query-engine construction"
//! design note) rather than read from a global.

/// Configuration shared by every query the engine runs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of configured storage tiers (`storage_tiers` in the source).
    pub storage_tiers: usize,
    /// Worker pool size; governs the per-metric read-ahead budget
    /// `P = worker_threads * 10 - 1` (§5).
    pub worker_threads: usize,
    /// The database's minimum natural update-every across all metrics,
    /// used as a fallback `query_granularity` when no tier-specific value
    /// is available.
    pub default_update_every_s: i64,
    /// Disables the absolute time clamps and the 86400-point cap that the
    /// source disables under its unit-test harness, so deterministic test
    /// windows aren't silently clamped to "now".
    pub unittest_running: bool,
}

impl EngineConfig {
    pub fn read_ahead_budget(&self) -> usize {
        self.worker_threads.saturating_mul(10).saturating_sub(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            storage_tiers: 1,
            worker_threads: 1,
            default_update_every_s: 1,
            unittest_running: false,
        }
    }
}
