// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use mt_events::{BatchId, ModId, RequestId, StateHash, TallyError};
use mt_fhe::{CiphertextHandle, EncryptedAggregator, SharedArithmetic};
use mt_guard::{AccessGuard, ActionKind, SharedClock};
use mt_ledger::{Batch, BatchLedger, Submission};
use mt_oracle::{decode_total, DecryptionContext, OracleClient, SharedOracle};
use tracing::info;

/// Version string reported by the contract surface.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct TallyParams {
    pub owner: Address,
    pub deployment: Address,
    pub cooldown_secs: u64,
    pub max_batch_size: u64,
    pub arith: SharedArithmetic,
    pub oracle: SharedOracle,
    pub clock: SharedClock,
}

/// The protocol state machine. Every call validates all of its preconditions
/// before committing any mutation, so a failed call leaves no partial state
/// behind, including the caller's cooldown stamp.
pub struct Tally {
    guard: AccessGuard,
    ledger: BatchLedger,
    aggregator: EncryptedAggregator,
    oracle: OracleClient,
    clock: SharedClock,
    initialized: bool,
    version: u64,
}

impl Tally {
    pub fn new(params: TallyParams) -> Result<Self, TallyError> {
        let mut guard = AccessGuard::new(params.owner);
        guard.set_cooldown_secs(params.owner, params.cooldown_secs)?;

        let mut ledger = BatchLedger::new(params.max_batch_size);
        ledger.set_max_batch_size(params.max_batch_size)?;

        Ok(Self {
            guard,
            ledger,
            aggregator: EncryptedAggregator::new(params.arith),
            oracle: OracleClient::new(params.oracle, params.deployment),
            clock: params.clock,
            initialized: false,
            version: 0,
        })
    }

    /// One-time setup. The owner becomes the first provider and the first
    /// batch is opened.
    pub fn initialize(&mut self, caller: Address) -> Result<BatchId, TallyError> {
        self.guard.ensure_owner(caller)?;
        if self.initialized {
            return Err(TallyError::AlreadyInitialized);
        }

        self.guard.add_provider(caller, caller)?;
        let batch_id = self.ledger.open_batch();
        self.initialized = true;
        self.bump();
        info!(owner = %caller, batch = %batch_id, "tally initialized");
        Ok(batch_id)
    }

    pub fn set_cooldown_interval(&mut self, caller: Address, secs: u64) -> Result<(), TallyError> {
        self.ensure_initialized()?;
        self.guard.set_cooldown_secs(caller, secs)?;
        self.bump();
        Ok(())
    }

    pub fn set_max_batch_size(&mut self, caller: Address, n: u64) -> Result<(), TallyError> {
        self.ensure_initialized()?;
        self.guard.ensure_owner(caller)?;
        self.ledger.set_max_batch_size(n)?;
        self.bump();
        Ok(())
    }

    pub fn pause(&mut self, caller: Address) -> Result<(), TallyError> {
        self.ensure_initialized()?;
        self.guard.set_paused(caller, true)?;
        self.bump();
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> Result<(), TallyError> {
        self.ensure_initialized()?;
        self.guard.set_paused(caller, false)?;
        self.bump();
        Ok(())
    }

    pub fn add_provider(&mut self, caller: Address, addr: Address) -> Result<(), TallyError> {
        self.ensure_initialized()?;
        self.guard.add_provider(caller, addr)?;
        self.bump();
        Ok(())
    }

    pub fn remove_provider(&mut self, caller: Address, addr: Address) -> Result<(), TallyError> {
        self.ensure_initialized()?;
        self.guard.remove_provider(caller, addr)?;
        self.bump();
        Ok(())
    }

    /// Open the next batch. Only one batch may be open at a time; the
    /// current one has to be closed first.
    pub fn open_batch(&mut self, caller: Address) -> Result<BatchId, TallyError> {
        self.ensure_initialized()?;
        self.guard.ensure_owner(caller)?;

        if let Some(current) = self.ledger.current_batch_id() {
            if self.ledger.batch(current).is_some_and(|b| b.is_open()) {
                return Err(TallyError::invalid_request(format!(
                    "{current} is still open"
                )));
            }
        }

        let batch_id = self.ledger.open_batch();
        self.bump();
        Ok(batch_id)
    }

    /// Close a batch. Closing is terminal; the batch and its submissions
    /// remain queryable and decryptable forever.
    pub fn close_batch(&mut self, caller: Address, id: BatchId) -> Result<(), TallyError> {
        self.ensure_initialized()?;
        self.guard.ensure_owner(caller)?;
        self.ledger.close_batch(id)?;
        self.bump();
        Ok(())
    }

    /// Record an encrypted score against the current batch. The score stays
    /// opaque; only the asynchronous decryption path ever exposes a total.
    pub fn submit_encrypted_mod(
        &mut self,
        caller: Address,
        mod_id: ModId,
        encrypted_score: CiphertextHandle,
    ) -> Result<BatchId, TallyError> {
        self.ensure_initialized()?;
        self.guard.ensure_provider(caller)?;
        self.guard.ensure_not_paused()?;

        let now = self.clock.now();
        self.guard.ensure_cooldown(caller, ActionKind::Submit, now)?;
        self.ledger.ensure_can_submit(&mod_id)?;

        let batch_id = self.ledger.submit(mod_id.clone(), caller, encrypted_score)?;
        self.guard.stamp(caller, ActionKind::Submit, now);
        self.bump();
        info!(batch = %batch_id, mod_id = %mod_id, submitter = %caller, "mod submitted");
        Ok(batch_id)
    }

    /// Recompute the batch aggregate from every stored submission and hand
    /// its canonical form to the oracle. The returned state hash commits the
    /// request to the aggregate as it stood at this moment. Open to any
    /// caller; only pause and cooldown gate it.
    pub fn request_batch_decryption(
        &mut self,
        caller: Address,
        batch_id: BatchId,
    ) -> Result<(RequestId, StateHash), TallyError> {
        self.ensure_initialized()?;
        self.guard.ensure_not_paused()?;

        let now = self.clock.now();
        self.guard
            .ensure_cooldown(caller, ActionKind::RequestDecryption, now)?;

        let aggregate = self.aggregator.recompute(self.ledger.scores(batch_id)?)?;
        let canonical = self.aggregator.canonical_bytes(&aggregate)?;

        let (request_id, state_hash) = self.oracle.request(batch_id, &canonical, caller)?;
        self.ledger.record_aggregate(batch_id, aggregate);
        self.guard.stamp(caller, ActionKind::RequestDecryption, now);
        self.bump();
        Ok((request_id, state_hash))
    }

    /// Accept an asynchronous decryption result. Replays are rejected first,
    /// then the commitment is checked against the batch's present aggregate,
    /// then the proof. Only a fully valid callback burns the request id.
    pub fn handle_decryption_callback(
        &mut self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<(BatchId, u64), TallyError> {
        self.ensure_initialized()?;

        let batch_id = self
            .oracle
            .context(request_id)
            .ok_or_else(|| {
                TallyError::invalid_request(format!("unknown request id {request_id}"))
            })?
            .batch_id;

        let aggregate = self.aggregator.recompute(self.ledger.scores(batch_id)?)?;
        let canonical = self.aggregator.canonical_bytes(&aggregate)?;

        self.oracle.ensure_callback_valid(request_id, &canonical)?;
        self.oracle.ensure_proof(request_id, cleartext, proof)?;

        let total = decode_total(cleartext)?;
        self.oracle.finalize(request_id)?;
        self.bump();
        info!(request = %request_id, batch = %batch_id, total, "decryption complete");
        Ok((batch_id, total))
    }

    // --- queries ---

    pub fn owner(&self) -> Address {
        self.guard.owner()
    }

    pub fn deployment(&self) -> Address {
        self.oracle.deployment()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_provider(&self, addr: Address) -> bool {
        self.guard.is_provider(addr)
    }

    pub fn paused(&self) -> bool {
        self.guard.paused()
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.guard.cooldown_secs()
    }

    pub fn max_batch_size(&self) -> u64 {
        self.ledger.max_batch_size()
    }

    pub fn current_batch_id(&self) -> Option<BatchId> {
        self.ledger.current_batch_id()
    }

    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.ledger.batch(id)
    }

    pub fn submission(&self, mod_id: &ModId) -> Option<&Submission> {
        self.ledger.submission(mod_id)
    }

    pub fn decryption_context(&self, id: RequestId) -> Option<&DecryptionContext> {
        self.oracle.context(id)
    }

    /// Monotonic counter bumped on every committed mutation. Lets an
    /// observer cheaply detect state drift between polls.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn protocol_version(&self) -> &'static str {
        PROTOCOL_VERSION
    }

    fn ensure_initialized(&self) -> Result<(), TallyError> {
        if !self.initialized {
            return Err(TallyError::NotInitialized);
        }
        Ok(())
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_fhe::PlainArithmetic;
    use mt_guard::SimClock;
    use mt_oracle::SimOracle;
    use std::sync::Arc;

    const OWNER: Address = Address::repeat_byte(0x01);
    const PROVIDER: Address = Address::repeat_byte(0x02);
    const STRANGER: Address = Address::repeat_byte(0x03);

    struct Fixture {
        tally: Tally,
        oracle: Arc<SimOracle>,
        clock: Arc<SimClock>,
    }

    fn fixture() -> Fixture {
        let oracle = Arc::new(SimOracle::new());
        let clock = Arc::new(SimClock::new(1_000));
        let tally = Tally::new(TallyParams {
            owner: OWNER,
            deployment: Address::repeat_byte(0xAA),
            cooldown_secs: 60,
            max_batch_size: 100,
            arith: Arc::new(PlainArithmetic),
            oracle: oracle.clone(),
            clock: clock.clone(),
        })
        .unwrap();
        Fixture {
            tally,
            oracle,
            clock,
        }
    }

    fn initialized() -> Fixture {
        let mut fx = fixture();
        fx.tally.initialize(OWNER).unwrap();
        fx.tally.add_provider(OWNER, PROVIDER).unwrap();
        fx
    }

    fn submit(fx: &mut Fixture, caller: Address, mod_id: &str, score: u64) -> BatchId {
        fx.clock.advance(60);
        fx.tally
            .submit_encrypted_mod(caller, ModId::from(mod_id), PlainArithmetic::encrypt(score))
            .unwrap()
    }

    #[test]
    fn initialize_opens_first_batch_and_runs_once() {
        let mut fx = fixture();
        assert_eq!(
            fx.tally.submit_encrypted_mod(
                OWNER,
                ModId::from("early"),
                PlainArithmetic::encrypt(1)
            ),
            Err(TallyError::NotInitialized)
        );

        let batch_id = fx.tally.initialize(OWNER).unwrap();
        assert_eq!(batch_id, BatchId::first());
        assert!(fx.tally.is_provider(OWNER));
        assert_eq!(fx.tally.current_batch_id(), Some(BatchId::first()));

        assert_eq!(
            fx.tally.initialize(OWNER),
            Err(TallyError::AlreadyInitialized)
        );
        assert_eq!(
            fixture().tally.initialize(STRANGER),
            Err(TallyError::NotOwner(STRANGER))
        );
    }

    #[test]
    fn submission_requires_provider_role() {
        let mut fx = initialized();
        assert_eq!(
            fx.tally.submit_encrypted_mod(
                STRANGER,
                ModId::from("mod-1"),
                PlainArithmetic::encrypt(1)
            ),
            Err(TallyError::NotProvider(STRANGER))
        );
        submit(&mut fx, PROVIDER, "mod-1", 5);
    }

    #[test]
    fn pause_blocks_submissions_and_requests() {
        let mut fx = initialized();
        fx.tally.pause(OWNER).unwrap();

        assert_eq!(
            fx.tally.submit_encrypted_mod(
                PROVIDER,
                ModId::from("mod-1"),
                PlainArithmetic::encrypt(1)
            ),
            Err(TallyError::Paused)
        );
        assert_eq!(
            fx.tally.request_batch_decryption(PROVIDER, BatchId::first()),
            Err(TallyError::Paused)
        );

        // No-op transitions are rejected
        assert_eq!(fx.tally.pause(OWNER), Err(TallyError::Paused));
        fx.tally.unpause(OWNER).unwrap();
        assert_eq!(fx.tally.unpause(OWNER), Err(TallyError::NotPaused));

        submit(&mut fx, PROVIDER, "mod-1", 1);
    }

    #[test]
    fn failed_submission_does_not_consume_cooldown_slot() {
        let mut fx = initialized();
        submit(&mut fx, PROVIDER, "mod-1", 5);

        // Duplicate fails and must not stamp
        fx.clock.advance(60);
        assert_eq!(
            fx.tally.submit_encrypted_mod(
                PROVIDER,
                ModId::from("mod-1"),
                PlainArithmetic::encrypt(5)
            ),
            Err(TallyError::DuplicateMod(ModId::from("mod-1")))
        );

        // A fresh mod at the same instant still passes the cooldown
        fx.tally
            .submit_encrypted_mod(PROVIDER, ModId::from("mod-2"), PlainArithmetic::encrypt(7))
            .unwrap();
    }

    #[test]
    fn rapid_submissions_are_rate_limited() {
        let mut fx = initialized();
        submit(&mut fx, PROVIDER, "mod-1", 5);

        let err = fx
            .tally
            .submit_encrypted_mod(PROVIDER, ModId::from("mod-2"), PlainArithmetic::encrypt(7))
            .unwrap_err();
        assert_eq!(
            err,
            TallyError::RateLimited {
                address: PROVIDER,
                action: "submit".to_string(),
            }
        );

        fx.clock.advance(60);
        fx.tally
            .submit_encrypted_mod(PROVIDER, ModId::from("mod-2"), PlainArithmetic::encrypt(7))
            .unwrap();
    }

    #[test]
    fn decryption_round_trip() {
        let mut fx = initialized();
        let batch_id = submit(&mut fx, PROVIDER, "mod-1", 10);
        submit(&mut fx, PROVIDER, "mod-2", 5);

        fx.clock.advance(60);
        let (request_id, _) = fx
            .tally
            .request_batch_decryption(PROVIDER, batch_id)
            .unwrap();

        let ciphertext = fx.oracle.ciphertext_for(request_id).unwrap();
        let cleartext = PlainArithmetic::decode(&ciphertext)
            .unwrap()
            .to_le_bytes()
            .to_vec();
        let proof = fx.oracle.prove(request_id, &cleartext);

        let (returned_batch, total) = fx
            .tally
            .handle_decryption_callback(request_id, &cleartext, &proof)
            .unwrap();
        assert_eq!(returned_batch, batch_id);
        assert_eq!(total, 15);

        assert_eq!(
            fx.tally.handle_decryption_callback(request_id, &cleartext, &proof),
            Err(TallyError::ReplayAttempt(request_id))
        );
    }

    #[test]
    fn decryption_request_is_open_to_any_caller() {
        let mut fx = initialized();
        let batch_id = submit(&mut fx, PROVIDER, "mod-1", 8);

        assert!(!fx.tally.is_provider(STRANGER));
        let (request_id, _) = fx
            .tally
            .request_batch_decryption(STRANGER, batch_id)
            .unwrap();
        assert_eq!(
            fx.tally.decryption_context(request_id).unwrap().requester,
            STRANGER
        );
    }

    #[test]
    fn submission_after_request_makes_result_stale() {
        let mut fx = initialized();
        let batch_id = submit(&mut fx, PROVIDER, "mod-1", 10);

        fx.clock.advance(60);
        let (request_id, _) = fx
            .tally
            .request_batch_decryption(PROVIDER, batch_id)
            .unwrap();

        let ciphertext = fx.oracle.ciphertext_for(request_id).unwrap();
        let cleartext = PlainArithmetic::decode(&ciphertext)
            .unwrap()
            .to_le_bytes()
            .to_vec();
        let proof = fx.oracle.prove(request_id, &cleartext);

        // Batch contents change between request and callback
        submit(&mut fx, PROVIDER, "mod-2", 5);

        assert_eq!(
            fx.tally.handle_decryption_callback(request_id, &cleartext, &proof),
            Err(TallyError::InvalidStateHash(request_id))
        );

        // A fresh request over the new aggregate still succeeds
        fx.clock.advance(60);
        let (request_id, _) = fx
            .tally
            .request_batch_decryption(PROVIDER, batch_id)
            .unwrap();
        let ciphertext = fx.oracle.ciphertext_for(request_id).unwrap();
        let cleartext = PlainArithmetic::decode(&ciphertext)
            .unwrap()
            .to_le_bytes()
            .to_vec();
        let proof = fx.oracle.prove(request_id, &cleartext);
        let (_, total) = fx
            .tally
            .handle_decryption_callback(request_id, &cleartext, &proof)
            .unwrap();
        assert_eq!(total, 15);
    }

    #[test]
    fn bad_proof_leaves_request_retryable() {
        let mut fx = initialized();
        let batch_id = submit(&mut fx, PROVIDER, "mod-1", 10);

        fx.clock.advance(60);
        let (request_id, _) = fx
            .tally
            .request_batch_decryption(PROVIDER, batch_id)
            .unwrap();

        let cleartext = 10u64.to_le_bytes().to_vec();
        assert_eq!(
            fx.tally
                .handle_decryption_callback(request_id, &cleartext, b"garbage"),
            Err(TallyError::InvalidProof(request_id))
        );

        let proof = fx.oracle.prove(request_id, &cleartext);
        let (_, total) = fx
            .tally
            .handle_decryption_callback(request_id, &cleartext, &proof)
            .unwrap();
        assert_eq!(total, 10);
    }

    #[test]
    fn closed_batch_remains_decryptable() {
        let mut fx = initialized();
        let first = submit(&mut fx, PROVIDER, "mod-1", 3);
        fx.tally.close_batch(OWNER, first).unwrap();
        let second = fx.tally.open_batch(OWNER).unwrap();
        assert_eq!(second, first.next());

        // Submissions now land in the new batch, the closed one stays frozen
        let landed = submit(&mut fx, PROVIDER, "mod-2", 4);
        assert_eq!(landed, second);

        fx.clock.advance(60);
        let (request_id, _) = fx.tally.request_batch_decryption(PROVIDER, first).unwrap();
        let ciphertext = fx.oracle.ciphertext_for(request_id).unwrap();
        let cleartext = PlainArithmetic::decode(&ciphertext)
            .unwrap()
            .to_le_bytes()
            .to_vec();
        let proof = fx.oracle.prove(request_id, &cleartext);
        let (_, total) = fx
            .tally
            .handle_decryption_callback(request_id, &cleartext, &proof)
            .unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn open_batch_requires_closing_current_first() {
        let mut fx = initialized();
        let err = fx.tally.open_batch(OWNER).unwrap_err();
        assert!(matches!(err, TallyError::InvalidRequest(_)));
    }

    #[test]
    fn empty_batch_cannot_be_decrypted() {
        let mut fx = initialized();
        assert_eq!(
            fx.tally.request_batch_decryption(PROVIDER, BatchId::first()),
            Err(TallyError::InvalidBatch(BatchId::first()))
        );
    }

    #[test]
    fn version_counts_committed_mutations_only() {
        let mut fx = initialized();
        let before = fx.tally.version();

        let _ = fx.tally.pause(STRANGER);
        assert_eq!(fx.tally.version(), before);

        fx.tally.pause(OWNER).unwrap();
        assert_eq!(fx.tally.version(), before + 1);
    }
}
