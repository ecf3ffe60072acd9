use thiserror::Error;

/// Failure to obtain the server directory.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Directory source unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the messaging gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The target message no longer exists.  Expected during sweeps.
    #[error("Message already gone")]
    AlreadyGone,
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn is_already_gone(&self) -> bool {
        matches!(self, GatewayError::AlreadyGone)
    }
}
