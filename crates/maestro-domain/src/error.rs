/// Shared error type used across all maestro crates.
///
/// Variants map one-to-one onto the service's error taxonomy: `Config`
/// and `Storage` surface as 503 with a remediation hint, `Validation`
/// as 4xx, `Downstream`/`Provider` are recoverable inside a request,
/// everything else is a 500.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("downstream {service}: {message}")]
    Downstream { service: String, message: String },

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("storage: {0}")]
    Storage(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short taxonomy tag for logs and response meta.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Config(_) => "config",
            Error::Downstream { .. } => "downstream_unavailable",
            Error::Provider { .. } => "provider_error",
            Error::Storage(_) => "storage_error",
            Error::Validation(_) => "validation_error",
            Error::Timeout(_) => "timeout",
            Error::Other(_) => "internal_error",
        }
    }

    /// A remediation hint for operator-facing 503 responses, when one
    /// exists for this error class.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Storage(_) => Some(
                "vector store is not reachable — start Qdrant (default \
                 http://localhost:6333) and retry",
            ),
            Error::Provider { .. } => Some(
                "no LLM/embedding provider configured — set OPENAI_API_KEY \
                 (or the AZURE_OPENAI_* variables) and retry",
            ),
            Error::Config(_) => Some("fix the configuration and restart"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
