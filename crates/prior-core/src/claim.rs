//! Claim pipeline: hash the sealed envelope, pin it, anchor the hash
//!
//! Storage and ledger are external collaborators reached over HTTP/RPC; they
//! are modelled as traits so the pipeline can be driven by any client (or by
//! in-memory fakes in tests). Nothing here retries: a failed upload or anchor
//! is returned to the caller as-is.

use chrono::Utc;
use std::future::Future;
use tracing::info;

use crate::error::{PriorError, PriorResult};
use crate::types::{ClaimDraft, ClaimReceipt};

/// Content-addressed storage that pins bytes and returns their identifier.
pub trait ContentStore: Send + Sync {
    fn upload(&self, name: &str, bytes: &[u8]) -> impl Future<Output = PriorResult<String>> + Send;
}

/// The on-chain write that timestamps a claim and returns a transaction id.
pub trait Ledger: Send + Sync {
    fn anchor(&self, draft: &ClaimDraft) -> impl Future<Output = PriorResult<String>> + Send;
}

/// Pin `envelope` and anchor its hash with `assertion`.
///
/// Order is fixed: the envelope is hashed, uploaded, and only then anchored,
/// so a recorded claim always points at content that was accepted by storage.
/// `file_size_bytes` is the size of the original plaintext file.
pub async fn submit_claim<S, L>(
    store: &S,
    ledger: &L,
    name: &str,
    envelope: &[u8],
    assertion: &str,
    file_size_bytes: u64,
) -> PriorResult<ClaimReceipt>
where
    S: ContentStore,
    L: Ledger,
{
    let assertion = assertion.trim();
    if assertion.is_empty() {
        return Err(PriorError::Claim("assertion must not be empty".into()));
    }
    if envelope.is_empty() {
        return Err(PriorError::Claim("envelope must not be empty".into()));
    }

    let draft = ClaimDraft::new(envelope, assertion, file_size_bytes);

    let storage_id = store.upload(name, envelope).await?;
    info!(
        content_hash = %draft.content_hash,
        storage_id = %storage_id,
        bytes = envelope.len(),
        "envelope pinned"
    );

    let draft = draft.with_storage_id(storage_id);
    let transaction_id = ledger.anchor(&draft).await?;
    info!(
        content_hash = %draft.content_hash,
        transaction_id = %transaction_id,
        "claim anchored"
    );

    Ok(ClaimReceipt {
        draft,
        transaction_id,
        anchored_at: Utc::now(),
    })
}
