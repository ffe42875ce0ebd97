// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Tally;
use actix::{Actor, Addr, Context, Handler, Message, MessageResponse};
use alloy_primitives::Address;
use mt_data::{ModMetadata, Repositories};
use mt_events::{
    BatchClosed, BatchId, BatchOpened, CooldownUpdated, DecryptionComplete, DecryptionRequested,
    EventBus, MaxBatchSizeUpdated, ModId, ModSubmitted, ProtocolError, ProtocolPaused,
    ProtocolUnpaused, ProviderAdded, ProviderRemoved, RateLimitTriggered, RequestId, StateHash,
    TallyError, TallyEvent,
};
use mt_fhe::CiphertextHandle;
use mt_ledger::{Batch, Submission};
use mt_oracle::DecryptionContext;

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<BatchId, TallyError>")]
pub struct Initialize {
    pub caller: Address,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), TallyError>")]
pub struct SetCooldownInterval {
    pub caller: Address,
    pub interval_secs: u64,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), TallyError>")]
pub struct SetMaxBatchSize {
    pub caller: Address,
    pub max_batch_size: u64,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), TallyError>")]
pub struct Pause {
    pub caller: Address,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), TallyError>")]
pub struct Unpause {
    pub caller: Address,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), TallyError>")]
pub struct AddProvider {
    pub caller: Address,
    pub address: Address,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), TallyError>")]
pub struct RemoveProvider {
    pub caller: Address,
    pub address: Address,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<BatchId, TallyError>")]
pub struct OpenBatch {
    pub caller: Address,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), TallyError>")]
pub struct CloseBatch {
    pub caller: Address,
    pub batch_id: BatchId,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<BatchId, TallyError>")]
pub struct SubmitEncryptedMod {
    pub caller: Address,
    pub mod_id: ModId,
    pub encrypted_score: CiphertextHandle,
    pub metadata: Option<ModMetadata>,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(RequestId, StateHash), TallyError>")]
pub struct RequestBatchDecryption {
    pub caller: Address,
    pub batch_id: BatchId,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(BatchId, u64), TallyError>")]
pub struct DecryptionCallback {
    pub request_id: RequestId,
    pub cleartext: Vec<u8>,
    pub proof: Vec<u8>,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<Batch>")]
pub struct GetBatch {
    pub batch_id: BatchId,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<BatchId>")]
pub struct GetCurrentBatchId;

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<Submission>")]
pub struct GetSubmission {
    pub mod_id: ModId,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<DecryptionContext>")]
pub struct GetDecryptionContext {
    pub request_id: RequestId,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "TallyStatus")]
pub struct GetStatus;

#[derive(MessageResponse, Clone, Debug, PartialEq, Eq)]
pub struct TallyStatus {
    pub owner: Address,
    pub deployment: Address,
    pub initialized: bool,
    pub paused: bool,
    pub cooldown_secs: u64,
    pub max_batch_size: u64,
    pub version: u64,
    pub protocol_version: &'static str,
}

/// Actor facade over the [`Tally`] engine. The mailbox serializes calls the
/// way a host chain serializes transactions, and every outcome is published
/// on the event bus.
pub struct TallyNode {
    tally: Tally,
    bus: Addr<EventBus<TallyEvent>>,
    repositories: Option<Repositories>,
}

impl TallyNode {
    pub fn new(
        tally: Tally,
        bus: Addr<EventBus<TallyEvent>>,
        repositories: Option<Repositories>,
    ) -> Self {
        Self {
            tally,
            bus,
            repositories,
        }
    }

    pub fn attach(
        tally: Tally,
        bus: Addr<EventBus<TallyEvent>>,
        repositories: Option<Repositories>,
    ) -> Addr<Self> {
        Self::new(tally, bus, repositories).start()
    }

    fn publish(&self, event: TallyEvent) {
        self.bus.do_send(event);
    }

    fn report(&self, error: &TallyError) {
        if let TallyError::RateLimited { address, action } = error {
            self.publish(
                RateLimitTriggered {
                    address: *address,
                    action: action.clone(),
                }
                .into(),
            );
        }
        self.publish(ProtocolError::new(error.clone()).into());
    }
}

impl Actor for TallyNode {
    type Context = Context<Self>;
}

impl Handler<Initialize> for TallyNode {
    type Result = Result<BatchId, TallyError>;

    fn handle(&mut self, msg: Initialize, _: &mut Self::Context) -> Self::Result {
        match self.tally.initialize(msg.caller) {
            Ok(batch_id) => {
                self.publish(ProviderAdded { address: msg.caller }.into());
                self.publish(BatchOpened { batch_id }.into());
                Ok(batch_id)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<SetCooldownInterval> for TallyNode {
    type Result = Result<(), TallyError>;

    fn handle(&mut self, msg: SetCooldownInterval, _: &mut Self::Context) -> Self::Result {
        match self.tally.set_cooldown_interval(msg.caller, msg.interval_secs) {
            Ok(()) => {
                self.publish(
                    CooldownUpdated {
                        interval_secs: msg.interval_secs,
                    }
                    .into(),
                );
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<SetMaxBatchSize> for TallyNode {
    type Result = Result<(), TallyError>;

    fn handle(&mut self, msg: SetMaxBatchSize, _: &mut Self::Context) -> Self::Result {
        match self.tally.set_max_batch_size(msg.caller, msg.max_batch_size) {
            Ok(()) => {
                self.publish(
                    MaxBatchSizeUpdated {
                        max_batch_size: msg.max_batch_size,
                    }
                    .into(),
                );
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<Pause> for TallyNode {
    type Result = Result<(), TallyError>;

    fn handle(&mut self, msg: Pause, _: &mut Self::Context) -> Self::Result {
        match self.tally.pause(msg.caller) {
            Ok(()) => {
                self.publish(ProtocolPaused { by: msg.caller }.into());
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<Unpause> for TallyNode {
    type Result = Result<(), TallyError>;

    fn handle(&mut self, msg: Unpause, _: &mut Self::Context) -> Self::Result {
        match self.tally.unpause(msg.caller) {
            Ok(()) => {
                self.publish(ProtocolUnpaused { by: msg.caller }.into());
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<AddProvider> for TallyNode {
    type Result = Result<(), TallyError>;

    fn handle(&mut self, msg: AddProvider, _: &mut Self::Context) -> Self::Result {
        match self.tally.add_provider(msg.caller, msg.address) {
            Ok(()) => {
                self.publish(ProviderAdded { address: msg.address }.into());
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<RemoveProvider> for TallyNode {
    type Result = Result<(), TallyError>;

    fn handle(&mut self, msg: RemoveProvider, _: &mut Self::Context) -> Self::Result {
        match self.tally.remove_provider(msg.caller, msg.address) {
            Ok(()) => {
                self.publish(ProviderRemoved { address: msg.address }.into());
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<OpenBatch> for TallyNode {
    type Result = Result<BatchId, TallyError>;

    fn handle(&mut self, msg: OpenBatch, _: &mut Self::Context) -> Self::Result {
        match self.tally.open_batch(msg.caller) {
            Ok(batch_id) => {
                self.publish(BatchOpened { batch_id }.into());
                Ok(batch_id)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<CloseBatch> for TallyNode {
    type Result = Result<(), TallyError>;

    fn handle(&mut self, msg: CloseBatch, _: &mut Self::Context) -> Self::Result {
        match self.tally.close_batch(msg.caller, msg.batch_id) {
            Ok(()) => {
                self.publish(
                    BatchClosed {
                        batch_id: msg.batch_id,
                    }
                    .into(),
                );
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<SubmitEncryptedMod> for TallyNode {
    type Result = Result<BatchId, TallyError>;

    fn handle(&mut self, msg: SubmitEncryptedMod, _: &mut Self::Context) -> Self::Result {
        match self
            .tally
            .submit_encrypted_mod(msg.caller, msg.mod_id.clone(), msg.encrypted_score)
        {
            Ok(batch_id) => {
                if let (Some(repos), Some(metadata)) = (&self.repositories, &msg.metadata) {
                    repos.mod_meta(&msg.mod_id).write(metadata);
                }
                self.publish(
                    ModSubmitted {
                        batch_id,
                        mod_id: msg.mod_id,
                        submitter: msg.caller,
                    }
                    .into(),
                );
                Ok(batch_id)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<RequestBatchDecryption> for TallyNode {
    type Result = Result<(RequestId, StateHash), TallyError>;

    fn handle(&mut self, msg: RequestBatchDecryption, _: &mut Self::Context) -> Self::Result {
        match self.tally.request_batch_decryption(msg.caller, msg.batch_id) {
            Ok((request_id, state_hash)) => {
                self.publish(
                    DecryptionRequested {
                        request_id,
                        batch_id: msg.batch_id,
                        state_hash,
                        requester: msg.caller,
                    }
                    .into(),
                );
                Ok((request_id, state_hash))
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<DecryptionCallback> for TallyNode {
    type Result = Result<(BatchId, u64), TallyError>;

    fn handle(&mut self, msg: DecryptionCallback, _: &mut Self::Context) -> Self::Result {
        match self
            .tally
            .handle_decryption_callback(msg.request_id, &msg.cleartext, &msg.proof)
        {
            Ok((batch_id, total)) => {
                self.publish(
                    DecryptionComplete {
                        request_id: msg.request_id,
                        batch_id,
                        total,
                    }
                    .into(),
                );
                Ok((batch_id, total))
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }
}

impl Handler<GetBatch> for TallyNode {
    type Result = Option<Batch>;

    fn handle(&mut self, msg: GetBatch, _: &mut Self::Context) -> Self::Result {
        self.tally.batch(msg.batch_id).cloned()
    }
}

impl Handler<GetCurrentBatchId> for TallyNode {
    type Result = Option<BatchId>;

    fn handle(&mut self, _: GetCurrentBatchId, _: &mut Self::Context) -> Self::Result {
        self.tally.current_batch_id()
    }
}

impl Handler<GetSubmission> for TallyNode {
    type Result = Option<Submission>;

    fn handle(&mut self, msg: GetSubmission, _: &mut Self::Context) -> Self::Result {
        self.tally.submission(&msg.mod_id).cloned()
    }
}

impl Handler<GetDecryptionContext> for TallyNode {
    type Result = Option<DecryptionContext>;

    fn handle(&mut self, msg: GetDecryptionContext, _: &mut Self::Context) -> Self::Result {
        self.tally.decryption_context(msg.request_id).cloned()
    }
}

impl Handler<GetStatus> for TallyNode {
    type Result = TallyStatus;

    fn handle(&mut self, _: GetStatus, _: &mut Self::Context) -> Self::Result {
        TallyStatus {
            owner: self.tally.owner(),
            deployment: self.tally.deployment(),
            initialized: self.tally.is_initialized(),
            paused: self.tally.paused(),
            cooldown_secs: self.tally.cooldown_secs(),
            max_batch_size: self.tally.max_batch_size(),
            version: self.tally.version(),
            protocol_version: self.tally.protocol_version(),
        }
    }
}
