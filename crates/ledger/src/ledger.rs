// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{Batch, Submission};
use alloy_primitives::Address;
use mt_events::{BatchId, ModId, TallyError};
use mt_fhe::CiphertextHandle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Owns the batch lifecycle and the submission set. There is exactly one
/// batch open for new writes at a time ("current"); historical closed batches
/// remain queryable for decryption. Admission control (roles, pause,
/// cooldown) happens in the engine before any mutation here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchLedger {
    batches: BTreeMap<BatchId, Batch>,
    submissions: HashMap<ModId, Submission>,
    current: Option<BatchId>,
    max_batch_size: u64,
}

impl BatchLedger {
    pub fn new(max_batch_size: u64) -> Self {
        Self {
            batches: BTreeMap::new(),
            submissions: HashMap::new(),
            current: None,
            max_batch_size,
        }
    }

    pub fn max_batch_size(&self) -> u64 {
        self.max_batch_size
    }

    pub fn set_max_batch_size(&mut self, n: u64) -> Result<(), TallyError> {
        if n == 0 {
            return Err(TallyError::invalid_request("max batch size must be non-zero"));
        }
        self.max_batch_size = n;
        Ok(())
    }

    pub fn current_batch_id(&self) -> Option<BatchId> {
        self.current
    }

    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(&id)
    }

    pub fn submission(&self, mod_id: &ModId) -> Option<&Submission> {
        self.submissions.get(mod_id)
    }

    /// Allocate the next sequential batch id, open it and make it the current
    /// target for submissions.
    pub fn open_batch(&mut self) -> BatchId {
        let id = match self.batches.keys().next_back() {
            Some(last) => last.next(),
            None => BatchId::first(),
        };
        self.batches.insert(id, Batch::open(id));
        self.current = Some(id);
        info!(batch = %id, "batch opened");
        id
    }

    /// Closing is terminal for the id; a new batch must be opened to resume
    /// accepting submissions.
    pub fn close_batch(&mut self, id: BatchId) -> Result<(), TallyError> {
        let batch = self
            .batches
            .get_mut(&id)
            .ok_or(TallyError::InvalidBatch(id))?;
        if !batch.is_open() {
            return Err(TallyError::BatchNotOpen(id));
        }
        batch.close();
        info!(batch = %id, "batch closed");
        Ok(())
    }

    /// Check every submission precondition without mutating. The engine calls
    /// this before committing anything so a failure leaves no partial state.
    pub fn ensure_can_submit(&self, mod_id: &ModId) -> Result<BatchId, TallyError> {
        let current = self.current.ok_or(TallyError::NotInitialized)?;
        let batch = self
            .batches
            .get(&current)
            .ok_or(TallyError::InvalidBatch(current))?;

        if self.submissions.contains_key(mod_id) {
            return Err(TallyError::DuplicateMod(mod_id.clone()));
        }
        if !batch.is_open() {
            return Err(TallyError::BatchNotOpen(current));
        }
        if batch.len() as u64 >= self.max_batch_size {
            return Err(TallyError::BatchFull(current));
        }
        Ok(current)
    }

    /// Record a submission against the current batch. Preconditions are
    /// re-validated so the ledger cannot be driven into an inconsistent state
    /// by a caller skipping [`ensure_can_submit`](Self::ensure_can_submit).
    pub fn submit(
        &mut self,
        mod_id: ModId,
        submitter: Address,
        encrypted_score: CiphertextHandle,
    ) -> Result<BatchId, TallyError> {
        let batch_id = self.ensure_can_submit(&mod_id)?;

        self.submissions.insert(
            mod_id.clone(),
            Submission {
                mod_id: mod_id.clone(),
                batch_id,
                submitter,
                encrypted_score,
            },
        );
        if let Some(batch) = self.batches.get_mut(&batch_id) {
            batch.append(mod_id);
        }
        Ok(batch_id)
    }

    /// The batch's encrypted scores in insertion order, for aggregate
    /// recomputation. Fails with InvalidBatch when the batch does not exist
    /// or has no submissions.
    pub fn scores(
        &self,
        id: BatchId,
    ) -> Result<Vec<(&ModId, &CiphertextHandle)>, TallyError> {
        let batch = self.batches.get(&id).ok_or(TallyError::InvalidBatch(id))?;
        if batch.is_empty() {
            return Err(TallyError::InvalidBatch(id));
        }
        let mut scores = Vec::with_capacity(batch.len());
        for mod_id in batch.mod_ids() {
            let submission = self
                .submissions
                .get(mod_id)
                .ok_or_else(|| TallyError::InvalidBatch(id))?;
            scores.push((&submission.mod_id, &submission.encrypted_score));
        }
        Ok(scores)
    }

    pub fn record_aggregate(&mut self, id: BatchId, aggregate: CiphertextHandle) {
        if let Some(batch) = self.batches.get_mut(&id) {
            batch.set_aggregate(aggregate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_fhe::PlainArithmetic;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn ledger() -> BatchLedger {
        let mut ledger = BatchLedger::new(3);
        ledger.open_batch();
        ledger
    }

    #[test]
    fn batch_ids_are_sequential() {
        let mut ledger = BatchLedger::new(10);
        assert_eq!(ledger.open_batch(), BatchId::new(1));
        assert_eq!(ledger.open_batch(), BatchId::new(2));
        assert_eq!(ledger.current_batch_id(), Some(BatchId::new(2)));
    }

    #[test]
    fn submit_before_initialize_fails() {
        let mut ledger = BatchLedger::new(3);
        let err = ledger
            .submit(ModId::new("m1"), addr(1), PlainArithmetic::encrypt(1))
            .unwrap_err();
        assert_eq!(err, TallyError::NotInitialized);
    }

    #[test]
    fn mod_ids_are_globally_unique() {
        let mut ledger = ledger();
        ledger
            .submit(ModId::new("m1"), addr(1), PlainArithmetic::encrypt(1))
            .unwrap();

        // Same id fails in the same batch
        let err = ledger
            .submit(ModId::new("m1"), addr(1), PlainArithmetic::encrypt(2))
            .unwrap_err();
        assert_eq!(err, TallyError::DuplicateMod(ModId::new("m1")));

        // And in a fresh batch
        ledger.open_batch();
        let err = ledger
            .submit(ModId::new("m1"), addr(1), PlainArithmetic::encrypt(2))
            .unwrap_err();
        assert_eq!(err, TallyError::DuplicateMod(ModId::new("m1")));
    }

    #[test]
    fn capacity_is_enforced_at_the_boundary() {
        let mut ledger = ledger();
        for i in 0..3 {
            ledger
                .submit(
                    ModId::new(format!("m{i}")),
                    addr(1),
                    PlainArithmetic::encrypt(i),
                )
                .unwrap();
        }
        let err = ledger
            .submit(ModId::new("m3"), addr(1), PlainArithmetic::encrypt(3))
            .unwrap_err();
        assert_eq!(err, TallyError::BatchFull(BatchId::first()));
    }

    #[test]
    fn closed_batch_rejects_submissions_and_reclose() {
        let mut ledger = ledger();
        let id = ledger.current_batch_id().unwrap();
        ledger.close_batch(id).unwrap();

        assert_eq!(
            ledger
                .submit(ModId::new("m1"), addr(1), PlainArithmetic::encrypt(1))
                .unwrap_err(),
            TallyError::BatchNotOpen(id)
        );
        assert_eq!(ledger.close_batch(id).unwrap_err(), TallyError::BatchNotOpen(id));
        assert_eq!(
            ledger.close_batch(BatchId::new(99)).unwrap_err(),
            TallyError::InvalidBatch(BatchId::new(99))
        );
    }

    #[test]
    fn scores_preserve_insertion_order() {
        let mut ledger = ledger();
        ledger
            .submit(ModId::new("b"), addr(1), PlainArithmetic::encrypt(1))
            .unwrap();
        ledger
            .submit(ModId::new("a"), addr(1), PlainArithmetic::encrypt(2))
            .unwrap();

        let scores = ledger.scores(BatchId::first()).unwrap();
        let ids: Vec<_> = scores.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn empty_batch_has_no_scores() {
        let ledger = ledger();
        assert_eq!(
            ledger.scores(BatchId::first()).unwrap_err(),
            TallyError::InvalidBatch(BatchId::first())
        );
    }

    #[test]
    fn zero_max_batch_size_rejected() {
        let mut ledger = ledger();
        assert!(ledger.set_max_batch_size(0).is_err());
        ledger.set_max_batch_size(5).unwrap();
        assert_eq!(ledger.max_batch_size(), 5);
    }
}
