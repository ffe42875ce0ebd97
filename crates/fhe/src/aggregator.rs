// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{CiphertextHandle, SharedArithmetic};
use mt_events::{ModId, TallyError};
use tracing::debug;

/// Thin adapter over the encrypted-arithmetic capability that folds a batch's
/// submissions into a single aggregate handle.
///
/// The aggregate is recomputed in full from the submission list on every
/// decryption request rather than maintained incrementally: the state hash
/// derived immediately after recomputation then always reflects the exact
/// current contents of the batch.
#[derive(Clone)]
pub struct EncryptedAggregator {
    arith: SharedArithmetic,
}

impl EncryptedAggregator {
    pub fn new(arith: SharedArithmetic) -> Self {
        Self { arith }
    }

    /// Fold encrypted-add over the scores in their recorded order, starting
    /// from the explicit zero handle.
    pub fn recompute<'a, I>(&self, scores: I) -> Result<CiphertextHandle, TallyError>
    where
        I: IntoIterator<Item = (&'a ModId, &'a CiphertextHandle)>,
    {
        let mut aggregate = self.arith.zero();
        let mut count = 0usize;

        for (mod_id, score) in scores {
            if !self.arith.is_initialized(score) {
                return Err(TallyError::UninitializedHandle(mod_id.clone()));
            }
            aggregate = self
                .arith
                .add(&aggregate, score)
                .map_err(|e| TallyError::invalid_request(format!("encrypted add failed: {e}")))?;
            count += 1;
        }

        debug!(count, "aggregate recomputed");
        Ok(aggregate)
    }

    /// Serialize a handle into the canonical representation the oracle
    /// expects.
    pub fn canonical_bytes(&self, handle: &CiphertextHandle) -> Result<Vec<u8>, TallyError> {
        self.arith
            .to_canonical_bytes(handle)
            .map_err(|e| TallyError::invalid_request(format!("ciphertext serialization failed: {e}")))
    }
}
