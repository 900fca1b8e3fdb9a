use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

/// Failures surfaced by the envelope codec.
///
/// None of the variants carry key material, passphrases or plaintext.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Caller-correctable input problem (empty passphrase, malformed key string).
    #[error("invalid input: {0}")]
    Input(String),

    /// The envelope could not be authenticated. Wrong secret, tampered bytes and
    /// format mismatches all collapse into this one variant.
    #[error("authentication failed: wrong secret or corrupted envelope")]
    Authentication,

    /// A cryptographic primitive is unavailable on this host.
    #[error("crypto environment unavailable: {0}")]
    Environment(String),
}

impl CodecError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, CodecError::Authentication)
    }
}
