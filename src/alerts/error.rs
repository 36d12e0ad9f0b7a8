use thiserror::Error;

/// Failure of an external advisory collaborator (weather, predictive model)
#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("advisory service is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service responded with HTTP {0}")]
    Status(u16),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}
