//! Key derivation: PBKDF2-HMAC-SHA256 passphrase → content key

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::{CodecError, CodecResult};
use crate::keys::ContentKey;
use crate::{KEY_SIZE, PBKDF2_ITERATIONS, SALT_SIZE};

/// Derive a 256-bit content key from a passphrase and salt.
///
/// The round count is fixed at [`PBKDF2_ITERATIONS`]; encode and decode must
/// agree on it, so it is not a parameter. The salt is stored in the envelope
/// and does not need to be secret.
pub fn derive_password_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
) -> CodecResult<ContentKey> {
    let passphrase = passphrase.expose_secret();
    if passphrase.is_empty() {
        return Err(CodecError::Input("passphrase must not be empty".into()));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);

    Ok(ContentKey::from_bytes(key))
}
