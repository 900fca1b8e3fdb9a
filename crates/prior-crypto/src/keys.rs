//! Content keys: random generation and base64 export/import

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::error::{CodecError, CodecResult};
use crate::KEY_SIZE;

/// A 256-bit AES-GCM key. Zeroized on drop.
#[derive(Clone)]
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit content key from the OS CSPRNG.
pub fn generate_content_key() -> CodecResult<ContentKey> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    Ok(ContentKey::from_bytes(bytes))
}

/// Export a key as standard padded base64 (44 chars) for the user to keep.
pub fn export_key(key: &ContentKey) -> String {
    B64.encode(key.as_bytes())
}

/// Import a key previously produced by [`export_key`].
///
/// Surrounding whitespace is ignored so keys pasted from a file still work.
pub fn import_key(encoded: &str) -> CodecResult<ContentKey> {
    let mut raw = B64
        .decode(encoded.trim())
        .map_err(|_| CodecError::Input("key is not valid base64".into()))?;

    if raw.len() != KEY_SIZE {
        let len = raw.len();
        raw.zeroize();
        return Err(CodecError::Input(format!(
            "key has wrong size: {len} bytes (expected {KEY_SIZE})"
        )));
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&raw);
    raw.zeroize();

    Ok(ContentKey::from_bytes(bytes))
}

/// Fill `buf` from the OS CSPRNG, reporting an unavailable source as an
/// environment error instead of panicking.
pub(crate) fn fill_random(buf: &mut [u8]) -> CodecResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CodecError::Environment(format!("secure random source failed: {e}")))
}
