// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use mt_data::{DataStore, ModMetadata, RepositoriesFactory};
use mt_events::{BatchId, ModId, TallyError, TallyEvent};
use mt_fhe::PlainArithmetic;
use mt_logger::SimpleLogger;
use mt_protocol::{
    AddProvider, CloseBatch, DecryptionCallback, GetBatch, GetCurrentBatchId,
    GetDecryptionContext, GetStatus, GetSubmission, Initialize, OpenBatch, Pause,
    RequestBatchDecryption, SetCooldownInterval, SetMaxBatchSize, SubmitEncryptedMod, Unpause,
};
use mt_test_helpers::{rand_eth_addr, TallyHarness};

async fn initialized_harness() -> Result<(TallyHarness, alloy_primitives::Address)> {
    let owner = rand_eth_addr();
    let harness = TallyHarness::new(owner)?;
    harness.node.send(Initialize { caller: owner }).await??;

    let provider = rand_eth_addr();
    harness
        .node
        .send(AddProvider {
            caller: owner,
            address: provider,
        })
        .await??;
    Ok((harness, provider))
}

async fn submit(
    harness: &TallyHarness,
    caller: alloy_primitives::Address,
    mod_id: &str,
    score: u64,
) -> Result<BatchId> {
    harness.clock.advance(60);
    let batch_id = harness
        .node
        .send(SubmitEncryptedMod {
            caller,
            mod_id: ModId::from(mod_id),
            encrypted_score: PlainArithmetic::encrypt(score),
            metadata: None,
        })
        .await??;
    Ok(batch_id)
}

#[actix::test]
async fn test_full_decryption_round_trip() -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let subscriber = fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_test_writer()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (harness, provider) = initialized_harness().await?;
    let _logger = SimpleLogger::<TallyEvent>::attach("test-node", harness.bus.clone());

    let batch_id = submit(&harness, provider, "mod-1", 10).await?;
    submit(&harness, provider, "mod-2", 5).await?;

    harness.clock.advance(60);
    let (request_id, _state_hash) = harness
        .node
        .send(RequestBatchDecryption {
            caller: provider,
            batch_id,
        })
        .await??;

    let context = harness
        .node
        .send(GetDecryptionContext { request_id })
        .await?
        .expect("context should be pending");
    assert!(!context.processed());

    let callback = harness.play_oracle(request_id)?;
    let (returned_batch, total) = harness.node.send(callback.clone()).await??;
    assert_eq!(returned_batch, batch_id);
    assert_eq!(total, 15);

    // The exact same callback replayed must be rejected and the first result
    // must stand
    let replay = harness.node.send(callback).await?;
    assert_eq!(replay, Err(TallyError::ReplayAttempt(request_id)));

    let events = harness.events().await?;
    let totals: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            TallyEvent::DecryptionComplete { data, .. } => Some(data.total),
            _ => None,
        })
        .collect();
    assert_eq!(totals, vec![15]);

    let errors: Vec<TallyError> = events
        .iter()
        .filter_map(|e| match e {
            TallyEvent::ProtocolError { data, .. } => Some(data.error.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![TallyError::ReplayAttempt(request_id)]);

    Ok(())
}

#[actix::test]
async fn test_mod_ids_are_unique_across_batches() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;
    let owner = harness.owner;

    submit(&harness, provider, "mod-1", 3).await?;
    harness
        .node
        .send(CloseBatch {
            caller: owner,
            batch_id: BatchId::first(),
        })
        .await??;
    let second = harness.node.send(OpenBatch { caller: owner }).await??;
    assert_eq!(second, BatchId::new(2));

    harness.clock.advance(60);
    let result = harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-1"),
            encrypted_score: PlainArithmetic::encrypt(3),
            metadata: None,
        })
        .await?;
    assert_eq!(result, Err(TallyError::DuplicateMod(ModId::from("mod-1"))));

    // The original submission is still attributed to the first batch
    let submission = harness
        .node
        .send(GetSubmission {
            mod_id: ModId::from("mod-1"),
        })
        .await?
        .expect("submission should persist");
    assert_eq!(submission.batch_id, BatchId::first());

    Ok(())
}

#[actix::test]
async fn test_batch_capacity_is_enforced() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;

    harness
        .node
        .send(SetMaxBatchSize {
            caller: harness.owner,
            max_batch_size: 2,
        })
        .await??;

    submit(&harness, provider, "mod-1", 1).await?;
    submit(&harness, provider, "mod-2", 2).await?;

    harness.clock.advance(60);
    let result = harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-3"),
            encrypted_score: PlainArithmetic::encrypt(3),
            metadata: None,
        })
        .await?;
    assert_eq!(result, Err(TallyError::BatchFull(BatchId::first())));

    Ok(())
}

#[actix::test]
async fn test_closed_batch_rejects_submissions_but_stays_readable() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;

    submit(&harness, provider, "mod-1", 9).await?;
    harness
        .node
        .send(CloseBatch {
            caller: harness.owner,
            batch_id: BatchId::first(),
        })
        .await??;

    harness.clock.advance(60);
    let result = harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-2"),
            encrypted_score: PlainArithmetic::encrypt(1),
            metadata: None,
        })
        .await?;
    assert_eq!(result, Err(TallyError::BatchNotOpen(BatchId::first())));

    let batch = harness
        .node
        .send(GetBatch {
            batch_id: BatchId::first(),
        })
        .await?
        .expect("closed batches are never deleted");
    assert!(!batch.is_open());
    assert_eq!(batch.mod_ids(), &[ModId::from("mod-1")]);

    // A closed batch can still be decrypted
    harness.clock.advance(60);
    let (request_id, _) = harness
        .node
        .send(RequestBatchDecryption {
            caller: provider,
            batch_id: BatchId::first(),
        })
        .await??;
    let callback = harness.play_oracle(request_id)?;
    let (_, total) = harness.node.send(callback).await??;
    assert_eq!(total, 9);

    Ok(())
}

#[actix::test]
async fn test_submission_after_request_invalidates_result() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;

    let batch_id = submit(&harness, provider, "mod-1", 10).await?;

    harness.clock.advance(60);
    let (request_id, _) = harness
        .node
        .send(RequestBatchDecryption {
            caller: provider,
            batch_id,
        })
        .await??;
    let stale_callback = harness.play_oracle(request_id)?;

    // Aggregate changes while the oracle is working
    submit(&harness, provider, "mod-2", 5).await?;

    let result = harness.node.send(stale_callback).await?;
    assert_eq!(result, Err(TallyError::InvalidStateHash(request_id)));

    // The request id is not burned but a fresh request covers the new state
    harness.clock.advance(60);
    let (fresh_id, _) = harness
        .node
        .send(RequestBatchDecryption {
            caller: provider,
            batch_id,
        })
        .await??;
    let callback = harness.play_oracle(fresh_id)?;
    let (_, total) = harness.node.send(callback).await??;
    assert_eq!(total, 15);

    Ok(())
}

#[actix::test]
async fn test_bad_proof_leaves_request_retryable() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;

    let batch_id = submit(&harness, provider, "mod-1", 7).await?;
    harness.clock.advance(60);
    let (request_id, _) = harness
        .node
        .send(RequestBatchDecryption {
            caller: provider,
            batch_id,
        })
        .await??;

    let mut callback = harness.play_oracle(request_id)?;
    let good_proof = callback.proof.clone();
    callback.proof = b"forged".to_vec();

    let result = harness.node.send(callback.clone()).await?;
    assert_eq!(result, Err(TallyError::InvalidProof(request_id)));

    callback.proof = good_proof;
    let (_, total) = harness.node.send(callback).await??;
    assert_eq!(total, 7);

    Ok(())
}

#[actix::test]
async fn test_rate_limiting_and_failed_calls_keep_the_slot() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;

    submit(&harness, provider, "mod-1", 1).await?;

    // Within the cooldown window a second submission is refused
    let result = harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-2"),
            encrypted_score: PlainArithmetic::encrypt(2),
            metadata: None,
        })
        .await?;
    assert_eq!(
        result,
        Err(TallyError::RateLimited {
            address: provider,
            action: "submit".to_string(),
        })
    );

    let events = harness.events().await?;
    assert!(events.iter().any(|e| matches!(
        e,
        TallyEvent::RateLimitTriggered { data, .. } if data.address == provider
    )));

    // A failing submission after the cooldown must not consume the slot
    harness.clock.advance(60);
    let result = harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-1"),
            encrypted_score: PlainArithmetic::encrypt(1),
            metadata: None,
        })
        .await?;
    assert_eq!(result, Err(TallyError::DuplicateMod(ModId::from("mod-1"))));

    // So a valid one at the same instant still goes through
    harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-2"),
            encrypted_score: PlainArithmetic::encrypt(2),
            metadata: None,
        })
        .await??;

    Ok(())
}

#[actix::test]
async fn test_any_caller_can_request_decryption() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;
    let batch_id = submit(&harness, provider, "mod-1", 6).await?;

    // Decryption requests are not reserved for providers
    let stranger = rand_eth_addr();
    let (request_id, _) = harness
        .node
        .send(RequestBatchDecryption {
            caller: stranger,
            batch_id,
        })
        .await??;

    let context = harness
        .node
        .send(GetDecryptionContext { request_id })
        .await?
        .expect("context should be pending");
    assert_eq!(context.requester, stranger);

    let callback = harness.play_oracle(request_id)?;
    let (_, total) = harness.node.send(callback).await??;
    assert_eq!(total, 6);

    Ok(())
}

#[actix::test]
async fn test_pause_cycle_is_fully_observable_on_the_bus() -> Result<()> {
    let (harness, _provider) = initialized_harness().await?;
    let owner = harness.owner;

    harness.node.send(Pause { caller: owner }).await??;
    harness.node.send(Unpause { caller: owner }).await??;
    harness.node.send(Pause { caller: owner }).await??;

    // Identical payloads must not shadow each other: both pauses and the
    // unpause in between all reach subscribers
    let events = harness.events().await?;
    let paused = events
        .iter()
        .filter(|e| matches!(e, TallyEvent::ProtocolPaused { .. }))
        .count();
    let unpaused = events
        .iter()
        .filter(|e| matches!(e, TallyEvent::ProtocolUnpaused { .. }))
        .count();
    assert_eq!((paused, unpaused), (2, 1));

    Ok(())
}

#[actix::test]
async fn test_pause_gates_submissions_and_requests() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;
    let owner = harness.owner;

    submit(&harness, provider, "mod-1", 4).await?;
    harness.node.send(Pause { caller: owner }).await??;

    harness.clock.advance(60);
    let result = harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-2"),
            encrypted_score: PlainArithmetic::encrypt(1),
            metadata: None,
        })
        .await?;
    assert_eq!(result, Err(TallyError::Paused));

    let result = harness
        .node
        .send(RequestBatchDecryption {
            caller: provider,
            batch_id: BatchId::first(),
        })
        .await?;
    assert_eq!(result, Err(TallyError::Paused));

    // No-op transitions are rejected
    let result = harness.node.send(Pause { caller: owner }).await?;
    assert_eq!(result, Err(TallyError::Paused));
    harness.node.send(Unpause { caller: owner }).await??;
    let result = harness.node.send(Unpause { caller: owner }).await?;
    assert_eq!(result, Err(TallyError::NotPaused));

    submit(&harness, provider, "mod-2", 1).await?;
    Ok(())
}

#[actix::test]
async fn test_owner_only_settings_and_bounds() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;
    let owner = harness.owner;

    let result = harness
        .node
        .send(SetCooldownInterval {
            caller: provider,
            interval_secs: 120,
        })
        .await?;
    assert_eq!(result, Err(TallyError::NotOwner(provider)));

    let result = harness
        .node
        .send(SetCooldownInterval {
            caller: owner,
            interval_secs: 5,
        })
        .await?;
    assert!(matches!(result, Err(TallyError::InvalidRequest(_))));

    let result = harness
        .node
        .send(SetMaxBatchSize {
            caller: owner,
            max_batch_size: 0,
        })
        .await?;
    assert!(matches!(result, Err(TallyError::InvalidRequest(_))));

    harness
        .node
        .send(SetCooldownInterval {
            caller: owner,
            interval_secs: 120,
        })
        .await??;
    let status = harness.node.send(GetStatus).await?;
    assert_eq!(status.cooldown_secs, 120);

    Ok(())
}

#[actix::test]
async fn test_initialize_runs_exactly_once() -> Result<()> {
    let owner = rand_eth_addr();
    let harness = TallyHarness::new(owner)?;

    let result = harness
        .node
        .send(SubmitEncryptedMod {
            caller: owner,
            mod_id: ModId::from("early"),
            encrypted_score: PlainArithmetic::encrypt(1),
            metadata: None,
        })
        .await?;
    assert_eq!(result, Err(TallyError::NotInitialized));

    let batch_id = harness.node.send(Initialize { caller: owner }).await??;
    assert_eq!(batch_id, BatchId::first());
    assert_eq!(
        harness.node.send(GetCurrentBatchId).await?,
        Some(BatchId::first())
    );

    let result = harness.node.send(Initialize { caller: owner }).await?;
    assert_eq!(result, Err(TallyError::AlreadyInitialized));

    Ok(())
}

#[actix::test]
async fn test_mod_metadata_is_persisted_alongside_submission() -> Result<()> {
    let (harness, provider) = initialized_harness().await?;

    let metadata = ModMetadata {
        name: "Night Vision".to_string(),
        description: "Toggleable night vision overlay".to_string(),
        submitter: provider,
    };

    harness.clock.advance(60);
    harness
        .node
        .send(SubmitEncryptedMod {
            caller: provider,
            mod_id: ModId::from("mod-1"),
            encrypted_score: PlainArithmetic::encrypt(2),
            metadata: Some(metadata.clone()),
        })
        .await??;

    let repos = DataStore::from(&harness.store).repositories();
    let stored = repos.mod_meta(&ModId::from("mod-1")).read().await?;
    assert_eq!(stored, Some(metadata));

    Ok(())
}

#[actix::test]
async fn test_config_drives_node_settings() -> Result<()> {
    use mt_config::TallyConfig;
    use mt_events::new_event_bus_with_history;
    use mt_guard::SimClock;
    use mt_oracle::SimOracle;
    use mt_protocol::{GetStatus, Tally, TallyNode, TallyParams};
    use std::sync::Arc;

    let config = TallyConfig::load(None)?;
    let owner = rand_eth_addr();

    let tally = Tally::new(TallyParams {
        owner,
        deployment: config.deployment,
        cooldown_secs: config.cooldown_secs,
        max_batch_size: config.max_batch_size as u64,
        arith: Arc::new(PlainArithmetic),
        oracle: Arc::new(SimOracle::new()),
        clock: Arc::new(SimClock::new(1_000)),
    })?;

    let (bus, _history) = new_event_bus_with_history::<TallyEvent>();
    let node = TallyNode::attach(tally, bus, None);
    node.send(Initialize { caller: owner }).await??;

    let status = node.send(GetStatus).await?;
    assert_eq!(status.cooldown_secs, config.cooldown_secs);
    assert_eq!(status.max_batch_size, config.max_batch_size as u64);
    assert_eq!(status.deployment, config.deployment);
    assert!(status.initialized);

    Ok(())
}
