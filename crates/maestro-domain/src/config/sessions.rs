use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Bounded sliding window of recent turns kept per session.
    #[serde(default = "d_window_max")]
    pub window_max: usize,
    /// Sessions idle longer than this are reclaimed.
    #[serde(default = "d_idle_hours")]
    pub idle_timeout_hours: u64,
    /// Cadence of the background reclaimer sweep, seconds.
    #[serde(default = "d_sweep_sec")]
    pub sweep_interval_sec: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            window_max: d_window_max(),
            idle_timeout_hours: d_idle_hours(),
            sweep_interval_sec: d_sweep_sec(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_window_max() -> usize {
    20
}
fn d_idle_hours() -> u64 {
    24
}
fn d_sweep_sec() -> u64 {
    3600
}
