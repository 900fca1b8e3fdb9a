//! Startup capability check for the primitives the codec relies on

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::hash::content_hash;
use crate::keys::fill_random;
use crate::{KEY_SIZE, NONCE_SIZE};

const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

/// Verify the secure RNG, SHA-256 and AES-256-GCM work on this host.
///
/// Run once before the first seal/open. Any failure is an
/// [`CodecError::Environment`]; callers should disable the feature rather
/// than retry per operation.
pub fn self_test() -> CodecResult<()> {
    let mut key = [0u8; KEY_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut key)?;
    fill_random(&mut nonce)?;
    if key.iter().all(|&b| b == 0) {
        return Err(CodecError::Environment(
            "secure random source returned all zeros".into(),
        ));
    }

    if content_hash(b"abc") != SHA256_ABC {
        return Err(CodecError::Environment(
            "SHA-256 known-answer test failed".into(),
        ));
    }

    let cipher = Aes256Gcm::new((&key).into());
    let nonce = Nonce::from_slice(&nonce);
    let probe = b"prior self-test";

    let mut sealed = cipher
        .encrypt(nonce, probe.as_ref())
        .map_err(|_| CodecError::Environment("AES-256-GCM encryption unavailable".into()))?;
    let opened = cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| CodecError::Environment("AES-256-GCM decryption unavailable".into()))?;
    if opened != probe {
        return Err(CodecError::Environment(
            "AES-256-GCM round trip mismatch".into(),
        ));
    }

    sealed[0] ^= 0x01;
    if cipher.decrypt(nonce, sealed.as_ref()).is_ok() {
        return Err(CodecError::Environment(
            "AES-256-GCM accepted a tampered ciphertext".into(),
        ));
    }

    debug!("crypto self-test passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_test_passes() {
        self_test().unwrap();
    }
}
