use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PriorResult;

/// Suffix appended to the original file name of a sealed envelope
pub const ENCRYPTED_SUFFIX: &str = "prior-encrypted";

const BASE36_UPPER: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const BASE36_LOWER: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The file a user keeps to open a raw-key envelope.
///
/// Holds the exported key, so it is as sensitive as the key itself.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyBundle {
    /// Base64 content key
    pub key: String,
    /// Name of the file the key protects
    pub filename: Option<String>,
    /// Creation time, milliseconds since the epoch
    pub timestamp: i64,
    /// Random bundle identifier
    pub id: String,
}

impl KeyBundle {
    pub fn new(exported_key: String, filename: Option<String>) -> Self {
        Self {
            key: exported_key,
            filename,
            timestamp: Utc::now().timestamp_millis(),
            id: random_base36(9, BASE36_LOWER),
        }
    }

    pub fn to_json(&self) -> PriorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> PriorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl std::fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBundle")
            .field("key", &"[REDACTED]")
            .field("filename", &self.filename)
            .field("timestamp", &self.timestamp)
            .field("id", &self.id)
            .finish()
    }
}

/// Key bundle file name: `PRIOR-KEY-YYYY-MM-DD-XXXXXX.key`
pub fn key_bundle_filename(date: NaiveDate) -> String {
    format!(
        "PRIOR-KEY-{}-{}.key",
        date.format("%Y-%m-%d"),
        random_base36(6, BASE36_UPPER)
    )
}

/// Envelope path for `input`: `<name>.prior-encrypted`, in `dir` if given.
pub fn encrypted_path(input: &Path, dir: Option<&Path>) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let file_name = format!("{name}.{ENCRYPTED_SUFFIX}");
    match dir {
        Some(d) => d.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// Inverse of [`encrypted_path`]; other names get a `.decrypted` suffix.
pub fn decrypted_path(envelope: &Path) -> PathBuf {
    match envelope.extension().and_then(|e| e.to_str()) {
        Some(ENCRYPTED_SUFFIX) => envelope.with_extension(""),
        _ => {
            let mut name = envelope.as_os_str().to_owned();
            name.push(".decrypted");
            PathBuf::from(name)
        }
    }
}

fn random_base36(len: usize, alphabet: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// What the contract write consumes for one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDraft {
    /// `0x`-prefixed SHA-256 of the sealed envelope
    pub content_hash: String,
    /// Content identifier returned by storage, once uploaded
    pub storage_id: Option<String>,
    /// The user's free-text claim statement
    pub assertion: String,
    /// Size of the original, unencrypted file
    pub file_size_bytes: u64,
}

impl ClaimDraft {
    pub fn new(envelope: &[u8], assertion: impl Into<String>, file_size_bytes: u64) -> Self {
        Self {
            content_hash: prior_crypto::anchor_hash(&prior_crypto::content_hash(envelope)),
            storage_id: None,
            assertion: assertion.into(),
            file_size_bytes,
        }
    }

    pub fn with_storage_id(mut self, storage_id: impl Into<String>) -> Self {
        self.storage_id = Some(storage_id.into());
        self
    }
}

/// A claim after the ledger accepted it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub draft: ClaimDraft,
    pub transaction_id: String,
    pub anchored_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bundle_filename_shape() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let name = key_bundle_filename(date);

        assert!(name.starts_with("PRIOR-KEY-2026-03-14-"));
        assert!(name.ends_with(".key"));
        let suffix = &name["PRIOR-KEY-2026-03-14-".len()..name.len() - 4];
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_key_bundle_json_roundtrip() {
        let bundle = KeyBundle::new("a2V5".into(), Some("deck.pdf".into()));
        let json = bundle.to_json().unwrap();
        let parsed = KeyBundle::from_json(&json).unwrap();

        assert_eq!(parsed.key, "a2V5");
        assert_eq!(parsed.filename.as_deref(), Some("deck.pdf"));
        assert_eq!(parsed.id.len(), 9);
        assert_eq!(parsed.timestamp, bundle.timestamp);
    }

    #[test]
    fn test_key_bundle_debug_redacts_key() {
        let bundle = KeyBundle::new("c2VjcmV0LWtleQ==".into(), None);
        assert!(!format!("{bundle:?}").contains("c2VjcmV0LWtleQ=="));
    }

    #[test]
    fn test_encrypted_path() {
        let input = Path::new("/data/deck.pdf");
        assert_eq!(
            encrypted_path(input, None),
            PathBuf::from("/data/deck.pdf.prior-encrypted")
        );
        assert_eq!(
            encrypted_path(input, Some(Path::new("/out"))),
            PathBuf::from("/out/deck.pdf.prior-encrypted")
        );
    }

    #[test]
    fn test_decrypted_path() {
        assert_eq!(
            decrypted_path(Path::new("/data/deck.pdf.prior-encrypted")),
            PathBuf::from("/data/deck.pdf")
        );
        assert_eq!(
            decrypted_path(Path::new("/data/genesis.enc")),
            PathBuf::from("/data/genesis.enc.decrypted")
        );
    }

    #[test]
    fn test_claim_draft_hash_is_anchor_form() {
        let draft = ClaimDraft::new(b"sealed bytes", "I wrote this first", 12);

        assert!(draft.content_hash.starts_with("0x"));
        assert_eq!(draft.content_hash.len(), 66);
        assert!(draft.storage_id.is_none());

        let draft = draft.with_storage_id("bafyclaim");
        assert_eq!(draft.storage_id.as_deref(), Some("bafyclaim"));
    }
}
