//! Envelope sealing and opening with AES-256-GCM
//!
//! Envelope formats (binary):
//! ```text
//! password: [0x01][16 bytes: PBKDF2 salt][12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! raw key:  [0x02][12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Everything after the one-byte marker is the legacy unmarked layout, so
//! [`EnvelopeLayout::Legacy`] reads and writes envelopes produced before the
//! marker existed. Legacy envelopes do not say which secret they need; the
//! caller decides by the [`Secret`] it passes in.
//!
//! No associated data is bound. Every failure while opening is reported as
//! [`CodecError::Authentication`] regardless of which check tripped.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::kdf::derive_password_key;
use crate::keys::{export_key, fill_random, generate_content_key, import_key, ContentKey};
use crate::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

const MARKER_PASSWORD: u8 = 0x01;
const MARKER_RAW_KEY: u8 = 0x02;

/// Which secret an envelope was sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeFormat {
    /// Key derived from a passphrase; the salt travels in the envelope.
    Password,
    /// Random 256-bit key kept by the user out of band.
    RawKey,
}

impl EnvelopeFormat {
    /// The leading byte of a versioned envelope.
    pub const fn marker(self) -> u8 {
        match self {
            EnvelopeFormat::Password => MARKER_PASSWORD,
            EnvelopeFormat::RawKey => MARKER_RAW_KEY,
        }
    }

    pub const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            MARKER_PASSWORD => Some(EnvelopeFormat::Password),
            MARKER_RAW_KEY => Some(EnvelopeFormat::RawKey),
            _ => None,
        }
    }

    /// Bytes preceding the ciphertext in the unmarked body.
    pub const fn body_header_len(self) -> usize {
        match self {
            EnvelopeFormat::Password => SALT_SIZE + NONCE_SIZE,
            EnvelopeFormat::RawKey => NONCE_SIZE,
        }
    }

    /// Smallest valid envelope (empty plaintext) in the given layout.
    pub const fn min_len(self, layout: EnvelopeLayout) -> usize {
        let body = self.body_header_len() + TAG_SIZE;
        match layout {
            EnvelopeLayout::Versioned => 1 + body,
            EnvelopeLayout::Legacy => body,
        }
    }

    /// Inspect a versioned envelope's marker without decrypting anything.
    ///
    /// Returns `None` for unknown markers, truncated input and legacy
    /// envelopes (whose first byte is random salt or nonce).
    pub fn detect(envelope: &[u8]) -> Option<Self> {
        let format = Self::from_marker(*envelope.first()?)?;
        (envelope.len() >= format.min_len(EnvelopeLayout::Versioned)).then_some(format)
    }
}

impl std::fmt::Display for EnvelopeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeFormat::Password => f.write_str("password"),
            EnvelopeFormat::RawKey => f.write_str("raw-key"),
        }
    }
}

/// Byte layout to write or expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeLayout {
    /// One-byte format marker followed by the body.
    #[default]
    Versioned,
    /// Bare body, as produced before the marker was introduced.
    Legacy,
}

/// The secret an envelope is sealed or opened with.
#[derive(Debug, Clone, Copy)]
pub enum Secret<'a> {
    Passphrase(&'a SecretString),
    Key(&'a ContentKey),
}

impl Secret<'_> {
    pub fn format(&self) -> EnvelopeFormat {
        match self {
            Secret::Passphrase(_) => EnvelopeFormat::Password,
            Secret::Key(_) => EnvelopeFormat::RawKey,
        }
    }

    fn validate(&self) -> CodecResult<()> {
        match self {
            Secret::Passphrase(p) if p.expose_secret().is_empty() => {
                Err(CodecError::Input("passphrase must not be empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Output of [`seal_with_random_key`]: the envelope and the key that opens it.
pub struct SealedWithKey {
    pub envelope: Vec<u8>,
    pub key: ContentKey,
    /// `key` as base64, ready to hand to the user.
    pub exported_key: String,
}

impl std::fmt::Debug for SealedWithKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedWithKey")
            .field("envelope_len", &self.envelope.len())
            .field("key", &self.key)
            .field("exported_key", &"[REDACTED]")
            .finish()
    }
}

/// Seal `plaintext` with `secret` in the given layout.
///
/// A fresh nonce is drawn for every call, and a fresh salt in password mode,
/// so sealing the same input twice never yields the same bytes.
pub fn seal(plaintext: &[u8], secret: Secret<'_>, layout: EnvelopeLayout) -> CodecResult<Vec<u8>> {
    secret.validate()?;
    let format = secret.format();

    let mut out = Vec::with_capacity(format.min_len(layout) + plaintext.len());
    if layout == EnvelopeLayout::Versioned {
        out.push(format.marker());
    }

    let derived;
    let key = match secret {
        Secret::Passphrase(passphrase) => {
            let mut salt = [0u8; SALT_SIZE];
            fill_random(&mut salt)?;
            out.extend_from_slice(&salt);
            derived = derive_password_key(passphrase, &salt)?;
            &derived
        }
        Secret::Key(key) => key,
    };

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;
    out.extend_from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CodecError::Input("plaintext too large for a single envelope".into()))?;
    out.extend_from_slice(&ciphertext);

    debug!(
        %format,
        ?layout,
        plaintext_len = plaintext.len(),
        envelope_len = out.len(),
        "sealed envelope"
    );
    Ok(out)
}

/// Open an envelope in the given layout.
///
/// The secret's kind must match how the envelope was sealed. A versioned
/// envelope whose marker disagrees with the secret fails like any other
/// tampered envelope.
pub fn open(envelope: &[u8], secret: Secret<'_>, layout: EnvelopeLayout) -> CodecResult<Vec<u8>> {
    secret.validate()?;
    let format = secret.format();

    if envelope.len() < format.min_len(layout) {
        return Err(CodecError::Authentication);
    }

    let body = match layout {
        EnvelopeLayout::Versioned => {
            let (marker, rest) = envelope
                .split_first()
                .ok_or(CodecError::Authentication)?;
            if EnvelopeFormat::from_marker(*marker) != Some(format) {
                return Err(CodecError::Authentication);
            }
            rest
        }
        EnvelopeLayout::Legacy => envelope,
    };

    let derived;
    let (key, rest) = match secret {
        Secret::Passphrase(passphrase) => {
            let (salt_bytes, rest) = body.split_at(SALT_SIZE);
            let mut salt = [0u8; SALT_SIZE];
            salt.copy_from_slice(salt_bytes);
            derived = derive_password_key(passphrase, &salt)?;
            (&derived, rest)
        }
        Secret::Key(key) => (key, body),
    };

    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CodecError::Authentication)?;

    debug!(
        %format,
        ?layout,
        envelope_len = envelope.len(),
        plaintext_len = plaintext.len(),
        "opened envelope"
    );
    Ok(plaintext)
}

/// Seal with a passphrase: `0x01 || salt || nonce || ciphertext+tag`.
pub fn seal_with_password(plaintext: &[u8], passphrase: &SecretString) -> CodecResult<Vec<u8>> {
    seal(plaintext, Secret::Passphrase(passphrase), EnvelopeLayout::Versioned)
}

/// Seal with a caller-provided key: `0x02 || nonce || ciphertext+tag`.
pub fn seal_with_key(plaintext: &[u8], key: &ContentKey) -> CodecResult<Vec<u8>> {
    seal(plaintext, Secret::Key(key), EnvelopeLayout::Versioned)
}

/// Generate a fresh key and seal with it.
///
/// The key is never written into the envelope. Losing `exported_key` makes
/// the envelope permanently unreadable.
pub fn seal_with_random_key(plaintext: &[u8]) -> CodecResult<SealedWithKey> {
    let key = generate_content_key()?;
    let envelope = seal_with_key(plaintext, &key)?;
    let exported_key = export_key(&key);
    Ok(SealedWithKey {
        envelope,
        key,
        exported_key,
    })
}

pub fn open_with_password(envelope: &[u8], passphrase: &SecretString) -> CodecResult<Vec<u8>> {
    open(envelope, Secret::Passphrase(passphrase), EnvelopeLayout::Versioned)
}

pub fn open_with_key(envelope: &[u8], key: &ContentKey) -> CodecResult<Vec<u8>> {
    open(envelope, Secret::Key(key), EnvelopeLayout::Versioned)
}

/// Open with a base64 key as produced by [`seal_with_random_key`].
///
/// A malformed key string is an input error, not an authentication failure.
pub fn open_with_exported_key(envelope: &[u8], exported_key: &str) -> CodecResult<Vec<u8>> {
    let key = import_key(exported_key)?;
    open_with_key(envelope, &key)
}

/// Open an unmarked envelope. The secret's kind selects the layout.
pub fn open_legacy(envelope: &[u8], secret: Secret<'_>) -> CodecResult<Vec<u8>> {
    open(envelope, secret, EnvelopeLayout::Legacy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_passphrase() -> SecretString {
        SecretString::from("PRIOR_GENESIS_SEED")
    }

    #[test]
    fn test_password_roundtrip() {
        let passphrase = genesis_passphrase();
        let envelope = seal_with_password(b"PRIOR!", &passphrase).unwrap();
        let plaintext = open_with_password(&envelope, &passphrase).unwrap();

        assert_eq!(plaintext, b"PRIOR!");
    }

    #[test]
    fn test_password_envelope_size() {
        let envelope = seal_with_password(b"PRIOR!", &genesis_passphrase()).unwrap();

        // marker (1) + salt (16) + nonce (12) + plaintext (6) + tag (16) = 51
        assert_eq!(envelope.len(), 1 + 16 + 12 + 6 + 16);
        assert_eq!(envelope[0], 0x01);
    }

    #[test]
    fn test_password_wrong_passphrase() {
        let envelope = seal_with_password(b"PRIOR!", &genesis_passphrase()).unwrap();
        let result = open_with_password(&envelope, &SecretString::from("wrong"));

        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_password_empty_plaintext() {
        let passphrase = genesis_passphrase();
        let envelope = seal_with_password(b"", &passphrase).unwrap();

        assert_eq!(envelope.len(), 1 + 16 + 12 + 16);
        assert_eq!(open_with_password(&envelope, &passphrase).unwrap(), b"");
    }

    #[test]
    fn test_empty_passphrase_is_input_error() {
        let empty = SecretString::from("");
        assert!(matches!(
            seal_with_password(b"data", &empty),
            Err(CodecError::Input(_))
        ));
        assert!(matches!(
            open_with_password(&[0x01; 64], &empty),
            Err(CodecError::Input(_))
        ));
    }

    #[test]
    fn test_random_key_roundtrip() {
        let sealed = seal_with_random_key(b"hello, sealed world!").unwrap();
        let plaintext = open_with_exported_key(&sealed.envelope, &sealed.exported_key).unwrap();

        assert_eq!(plaintext, b"hello, sealed world!");
        assert_eq!(sealed.envelope[0], 0x02);
        assert_eq!(sealed.envelope.len(), 1 + 12 + 20 + 16);
    }

    #[test]
    fn test_random_key_never_embedded() {
        let sealed = seal_with_random_key(&[0u8; 64]).unwrap();
        let key = sealed.key.as_bytes();

        assert!(
            !sealed.envelope.windows(key.len()).any(|w| w == key),
            "raw key must not appear in the envelope"
        );
    }

    #[test]
    fn test_random_key_wrong_key() {
        let sealed = seal_with_random_key(b"secret data").unwrap();
        let other = generate_content_key().unwrap();

        let result = open_with_key(&sealed.envelope, &other);
        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_sealed_with_key_debug_redacts_key() {
        let sealed = seal_with_random_key(b"x").unwrap();
        let dbg = format!("{sealed:?}");

        assert!(!dbg.contains(&sealed.exported_key));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn test_malformed_exported_key_is_input_error() {
        let sealed = seal_with_random_key(b"secret data").unwrap();
        let result = open_with_exported_key(&sealed.envelope, "%%%");

        assert!(matches!(result, Err(CodecError::Input(_))));
    }

    #[test]
    fn test_tampered_every_byte_raw_key() {
        let key = generate_content_key().unwrap();
        let envelope = seal_with_key(b"tamper me", &key).unwrap();

        for i in 0..envelope.len() {
            let mut tampered = envelope.clone();
            tampered[i] ^= 0x01;
            let result = open_with_key(&tampered, &key);
            assert!(
                matches!(result, Err(CodecError::Authentication)),
                "flipping byte {i} must fail authentication"
            );
        }
    }

    #[test]
    fn test_tampered_password_fields() {
        let passphrase = genesis_passphrase();
        let envelope = seal_with_password(b"tamper me", &passphrase).unwrap();

        // marker, salt, nonce, ciphertext, tag
        for i in [0, 5, 20, 30, envelope.len() - 1] {
            let mut tampered = envelope.clone();
            tampered[i] ^= 0x80;
            let result = open_with_password(&tampered, &passphrase);
            assert!(
                matches!(result, Err(CodecError::Authentication)),
                "flipping byte {i} must fail authentication"
            );
        }
    }

    #[test]
    fn test_truncated_envelope() {
        let key = generate_content_key().unwrap();
        let envelope = seal_with_key(b"", &key).unwrap();

        let result = open_with_key(&envelope[..envelope.len() - 1], &key);
        assert!(matches!(result, Err(CodecError::Authentication)));
        assert!(matches!(
            open_with_key(&[], &key),
            Err(CodecError::Authentication)
        ));
    }

    #[test]
    fn test_mode_mismatch_fails_authentication() {
        let key = generate_content_key().unwrap();
        let envelope = seal_with_key(&[0u8; 32], &key).unwrap();

        let result = open_with_password(&envelope, &genesis_passphrase());
        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_legacy_password_layout() {
        let passphrase = genesis_passphrase();
        let envelope = seal(
            b"PRIOR!",
            Secret::Passphrase(&passphrase),
            EnvelopeLayout::Legacy,
        )
        .unwrap();

        // salt (16) + nonce (12) + plaintext (6) + tag (16) = 50
        assert_eq!(envelope.len(), 50);
        let plaintext = open_legacy(&envelope, Secret::Passphrase(&passphrase)).unwrap();
        assert_eq!(plaintext, b"PRIOR!");
    }

    #[test]
    fn test_legacy_empty_plaintext_is_44_bytes() {
        let passphrase = genesis_passphrase();
        let envelope = seal(b"", Secret::Passphrase(&passphrase), EnvelopeLayout::Legacy).unwrap();

        assert_eq!(envelope.len(), 44);
        assert_eq!(
            open_legacy(&envelope, Secret::Passphrase(&passphrase)).unwrap(),
            b""
        );
    }

    #[test]
    fn test_versioned_body_is_legacy_envelope() {
        let key = generate_content_key().unwrap();
        let envelope = seal_with_key(b"interop", &key).unwrap();

        let plaintext = open_legacy(&envelope[1..], Secret::Key(&key)).unwrap();
        assert_eq!(plaintext, b"interop");
    }

    #[test]
    fn test_legacy_raw_key_handcrafted() {
        // Built field by field, the way pre-marker envelopes were assembled
        let key = ContentKey::from_bytes([9u8; 32]);
        let nonce = [3u8; NONCE_SIZE];
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), b"old upload".as_ref())
            .unwrap();

        let mut envelope = nonce.to_vec();
        envelope.extend_from_slice(&ciphertext);

        let plaintext = open_legacy(&envelope, Secret::Key(&key)).unwrap();
        assert_eq!(plaintext, b"old upload");
    }

    #[test]
    fn test_detect() {
        let key = generate_content_key().unwrap();
        let raw = seal_with_key(b"x", &key).unwrap();
        let pw = seal_with_password(b"x", &genesis_passphrase()).unwrap();

        assert_eq!(EnvelopeFormat::detect(&raw), Some(EnvelopeFormat::RawKey));
        assert_eq!(EnvelopeFormat::detect(&pw), Some(EnvelopeFormat::Password));
        assert_eq!(EnvelopeFormat::detect(&[0x01, 0x00]), None);
        assert_eq!(EnvelopeFormat::detect(&[0x7F; 64]), None);
        assert_eq!(EnvelopeFormat::detect(&[]), None);
    }

    #[test]
    fn test_min_len() {
        assert_eq!(EnvelopeFormat::Password.min_len(EnvelopeLayout::Legacy), 44);
        assert_eq!(EnvelopeFormat::Password.min_len(EnvelopeLayout::Versioned), 45);
        assert_eq!(EnvelopeFormat::RawKey.min_len(EnvelopeLayout::Legacy), 28);
        assert_eq!(EnvelopeFormat::RawKey.min_len(EnvelopeLayout::Versioned), 29);
    }
}
