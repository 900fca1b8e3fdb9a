//! prior-crypto: client-side envelope encryption for PRIOR
//!
//! A file is sealed locally before it ever leaves the machine, the sealed
//! envelope is pinned to content-addressed storage, and its SHA-256 digest is
//! anchored on-chain.
//!
//! Envelope formats:
//! ```text
//! password (0x01): 0x01 || salt[16] || iv[12] || AES-256-GCM(ciphertext || tag[16])
//! raw key  (0x02): 0x02 || iv[12] || AES-256-GCM(ciphertext || tag[16])
//! ```
//!
//! Password keys come from PBKDF2-HMAC-SHA256 with a fixed 100,000 rounds.
//! Raw keys are random 256-bit keys exported to the user as base64; they are
//! never embedded in the envelope.
//!
//! The bytes after the marker are the legacy unmarked layout, which
//! [`open_legacy`] still reads.

pub mod envelope;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod selftest;

pub use envelope::{
    open, open_legacy, open_with_exported_key, open_with_key, open_with_password, seal,
    seal_with_key, seal_with_password, seal_with_random_key, EnvelopeFormat, EnvelopeLayout,
    SealedWithKey, Secret,
};
pub use error::{CodecError, CodecResult};
pub use hash::{anchor_hash, content_hash, content_hash_file, parse_content_hash};
pub use kdf::derive_password_key;
pub use keys::{export_key, generate_content_key, import_key, ContentKey};
pub use selftest::self_test;

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of the PBKDF2 salt stored in password envelopes
pub const SALT_SIZE: usize = 16;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// PBKDF2-HMAC-SHA256 rounds. Changing this breaks every existing envelope.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
