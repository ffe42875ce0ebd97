// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{ContextStore, DecryptionContext, SharedOracle};
use alloy_primitives::{keccak256, Address};
use mt_events::{BatchId, RequestId, StateHash, TallyError};
use tracing::{info, warn};

/// Drives the request/response protocol with the external oracle: commits to
/// the aggregate snapshot with a state hash, submits the opaque request, and
/// validates the asynchronous callback before the plaintext is exposed.
#[derive(Clone)]
pub struct OracleClient {
    oracle: SharedOracle,
    /// Identity of this deployment, mixed into every state hash so a
    /// decryption bound to one deployment cannot be replayed against another.
    deployment: Address,
    contexts: ContextStore,
}

impl OracleClient {
    pub fn new(oracle: SharedOracle, deployment: Address) -> Self {
        Self {
            oracle,
            deployment,
            contexts: ContextStore::default(),
        }
    }

    pub fn deployment(&self) -> Address {
        self.deployment
    }

    pub fn context(&self, id: RequestId) -> Option<&DecryptionContext> {
        self.contexts.get(id)
    }

    /// Commitment over the canonical aggregate bytes, the batch and this
    /// deployment's identity.
    pub fn state_hash(&self, batch_id: BatchId, canonical: &[u8]) -> StateHash {
        let mut preimage =
            Vec::with_capacity(Address::len_bytes() + 8 + canonical.len());
        preimage.extend_from_slice(self.deployment.as_slice());
        preimage.extend_from_slice(&batch_id.value().to_be_bytes());
        preimage.extend_from_slice(canonical);
        StateHash::new(keccak256(&preimage))
    }

    /// Submit an opaque decryption request and record its pending context.
    pub fn request(
        &mut self,
        batch_id: BatchId,
        canonical: &[u8],
        requester: Address,
    ) -> Result<(RequestId, StateHash), TallyError> {
        let state_hash = self.state_hash(batch_id, canonical);
        let request_id = self
            .oracle
            .request_decryption(canonical.to_vec())
            .map_err(|e| TallyError::invalid_request(format!("oracle request failed: {e}")))?;

        self.contexts.insert(DecryptionContext::new(
            request_id, batch_id, state_hash, requester,
        ))?;

        info!(request = %request_id, batch = %batch_id, hash = %state_hash, "decryption requested");
        Ok((request_id, state_hash))
    }

    /// Validate a callback against its stored context: replay first, then
    /// staleness against the hash recomputed from the batch's current
    /// aggregate. Returns the context's batch id on success. No state is
    /// mutated here.
    pub fn ensure_callback_valid(
        &self,
        request_id: RequestId,
        canonical_now: &[u8],
    ) -> Result<BatchId, TallyError> {
        let ctx = self
            .contexts
            .get(request_id)
            .ok_or_else(|| TallyError::invalid_request(format!("unknown request id {request_id}")))?;

        if ctx.processed() {
            return Err(TallyError::ReplayAttempt(request_id));
        }

        let current = self.state_hash(ctx.batch_id, canonical_now);
        if current != ctx.state_hash {
            warn!(
                request = %request_id,
                committed = %ctx.state_hash,
                current = %current,
                "stale decryption result rejected"
            );
            return Err(TallyError::InvalidStateHash(request_id));
        }

        Ok(ctx.batch_id)
    }

    /// Delegate proof verification to the oracle capability. A failed proof
    /// leaves the context unprocessed so a corrected callback for the same
    /// request id remains possible.
    pub fn ensure_proof(
        &self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<(), TallyError> {
        if !self.oracle.verify_proof(request_id, cleartext, proof) {
            return Err(TallyError::InvalidProof(request_id));
        }
        Ok(())
    }

    /// Mark the context processed, exactly once.
    pub fn finalize(&mut self, request_id: RequestId) -> Result<BatchId, TallyError> {
        let ctx = self.contexts.mark_processed(request_id)?;
        info!(request = %request_id, batch = %ctx.batch_id, "decryption finalized");
        Ok(ctx.batch_id)
    }
}

/// Decode the plaintext total from the oracle's cleartext payload: a
/// little-endian u64 in the first 8 bytes. Trailing bytes are ignored.
pub fn decode_total(cleartext: &[u8]) -> Result<u64, TallyError> {
    if cleartext.len() < 8 {
        return Err(TallyError::invalid_request("cleartext payload too short"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&cleartext[0..8]);
    Ok(u64::from_le_bytes(raw))
}
