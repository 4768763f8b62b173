mod llm;
mod retrieval;
mod server;
mod services;
mod sessions;

pub use llm::*;
pub use retrieval::*;
pub use server::*;
pub use services::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults (credentials come from env vars either way).
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| crate::error::Error::Config(format!("{}: {e}", path.display())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        for (field, url) in [
            ("services.weather_url", &self.services.weather_url),
            ("services.calendar_url", &self.services.calendar_url),
            ("services.file_url", &self.services.file_url),
            ("services.notification_url", &self.services.notification_url),
        ] {
            if url.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "base URL must not be empty".into(),
                });
            }
        }

        if self.sessions.window_max == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "sessions.window_max".into(),
                message: "window_max must be at least 1".into(),
            });
        }

        if self.retrieval.vector_dim == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "retrieval.vector_dim".into(),
                message: "vector_dim must be greater than 0".into(),
            });
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "retrieval.chunk_overlap".into(),
                message: "chunk_overlap must be smaller than chunk_size".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.retrieval.alpha) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "retrieval.alpha".into(),
                message: "alpha must be within [0, 1]".into(),
            });
        }

        if self.llm.kind == LlmKind::Disabled {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.kind".into(),
                message: "no LLM provider configured — runtime will use the \
                          rule-based fallback path"
                    .into(),
            });
        }

        issues
    }
}
