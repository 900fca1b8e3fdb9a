//! SHA-256 content hashing for envelopes
//!
//! The digest of the sealed envelope is the fingerprint anchored on-chain.
//! Rendered as 64 lowercase hex chars; the contract call takes the
//! `0x`-prefixed form.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::error::{CodecError, CodecResult};

/// Length of a hex-rendered SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Hash a byte slice in memory.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Hash a file from disk with a 64KB read buffer.
///
/// Produces the same digest as [`content_hash`] over the file's bytes.
pub fn content_hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("opening file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading for hash: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// `0x`-prefixed form of a content hash.
pub fn anchor_hash(hex: &str) -> String {
    let bare = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    format!("0x{bare}")
}

/// Parse a content hash in either bare or `0x` form, returning bare lowercase hex.
pub fn parse_content_hash(input: &str) -> CodecResult<String> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.len() != HASH_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CodecError::Input(format!(
            "content hash must be {HASH_HEX_LEN} hex chars, got '{input}'"
        )));
    }

    Ok(hex.to_ascii_lowercase())
}
