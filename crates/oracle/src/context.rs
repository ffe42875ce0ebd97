// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use mt_events::{BatchId, RequestId, StateHash, TallyError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rendezvous record correlating a decryption request with its asynchronous
/// callback. Created when the request is submitted, mutated exactly once when
/// the matching callback succeeds, never deleted; it doubles as the audit
/// and replay-guard record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecryptionContext {
    pub request_id: RequestId,
    pub batch_id: BatchId,
    pub state_hash: StateHash,
    pub requester: Address,
    processed: bool,
}

impl DecryptionContext {
    pub fn new(
        request_id: RequestId,
        batch_id: BatchId,
        state_hash: StateHash,
        requester: Address,
    ) -> Self {
        Self {
            request_id,
            batch_id,
            state_hash,
            requester,
            processed: false,
        }
    }

    pub fn processed(&self) -> bool {
        self.processed
    }
}

/// Append-only store of decryption contexts keyed by request id. The
/// `processed` flag is monotonic: false → true, once.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContextStore {
    contexts: HashMap<RequestId, DecryptionContext>,
}

impl ContextStore {
    pub fn get(&self, id: RequestId) -> Option<&DecryptionContext> {
        self.contexts.get(&id)
    }

    pub fn insert(&mut self, ctx: DecryptionContext) -> Result<(), TallyError> {
        if self.contexts.contains_key(&ctx.request_id) {
            return Err(TallyError::invalid_request(format!(
                "oracle reissued request id {}",
                ctx.request_id
            )));
        }
        self.contexts.insert(ctx.request_id, ctx);
        Ok(())
    }

    /// Flip `processed`, exactly once.
    pub fn mark_processed(&mut self, id: RequestId) -> Result<&DecryptionContext, TallyError> {
        let ctx = self
            .contexts
            .get_mut(&id)
            .ok_or_else(|| TallyError::invalid_request(format!("unknown request id {id}")))?;
        if ctx.processed {
            return Err(TallyError::ReplayAttempt(id));
        }
        ctx.processed = true;
        Ok(ctx)
    }
}
