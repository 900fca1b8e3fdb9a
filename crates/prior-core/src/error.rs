use prior_crypto::CodecError;
use thiserror::Error;

pub type PriorResult<T> = Result<T, PriorError>;

#[derive(Debug, Error)]
pub enum PriorError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("config error: {0}")]
    Config(String),

    #[error("claim error: {0}")]
    Claim(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PriorError {
    /// True when the failure is the codec's generic authentication failure.
    pub fn is_authentication(&self) -> bool {
        matches!(self, PriorError::Codec(e) if e.is_authentication())
    }
}
