use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Downstream tool services
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Base URLs for the mock downstream services the executor calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "d_weather_url")]
    pub weather_url: String,
    #[serde(default = "d_calendar_url")]
    pub calendar_url: String,
    #[serde(default = "d_file_url")]
    pub file_url: String,
    #[serde(default = "d_notification_url")]
    pub notification_url: String,
    /// Hard per-call deadline, seconds.
    #[serde(default = "d_timeout_sec")]
    pub timeout_sec: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            weather_url: d_weather_url(),
            calendar_url: d_calendar_url(),
            file_url: d_file_url(),
            notification_url: d_notification_url(),
            timeout_sec: d_timeout_sec(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_weather_url() -> String {
    "http://localhost:8001".into()
}
fn d_calendar_url() -> String {
    "http://localhost:8002".into()
}
fn d_file_url() -> String {
    "http://localhost:8003".into()
}
fn d_notification_url() -> String {
    "http://localhost:8004".into()
}
fn d_timeout_sec() -> u64 {
    10
}
