// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use mt_events::{BatchId, ModId};
use mt_fhe::CiphertextHandle;
use serde::{Deserialize, Serialize};

/// A bounded, insertion-ordered collection of submissions aggregated together
/// for a single decryption. Batches are created open, closed exactly once,
/// and never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Batch {
    id: BatchId,
    open: bool,
    mod_ids: Vec<ModId>,
    /// Last recomputed aggregate. `None` means uninitialized, which is a
    /// valid state reading as "zero".
    aggregate: Option<CiphertextHandle>,
}

impl Batch {
    pub fn open(id: BatchId) -> Self {
        Self {
            id,
            open: true,
            mod_ids: Vec::new(),
            aggregate: None,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn len(&self) -> usize {
        self.mod_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mod_ids.is_empty()
    }

    /// Submitted mod ids in insertion order.
    pub fn mod_ids(&self) -> &[ModId] {
        &self.mod_ids
    }

    pub fn aggregate(&self) -> Option<&CiphertextHandle> {
        self.aggregate.as_ref()
    }

    pub(crate) fn append(&mut self, mod_id: ModId) {
        self.mod_ids.push(mod_id);
    }

    pub(crate) fn close(&mut self) {
        self.open = false;
    }

    pub(crate) fn set_aggregate(&mut self, aggregate: CiphertextHandle) {
        self.aggregate = Some(aggregate);
    }
}

/// A single encrypted score keyed by its globally unique mod id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub mod_id: ModId,
    pub batch_id: BatchId,
    pub submitter: Address,
    pub encrypted_score: CiphertextHandle,
}
