// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{BatchId, ModId, RequestId};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Typed failure reasons for every protocol call. Each error aborts the
/// triggering call with no partial state change; none are fatal to the
/// protocol as a whole.
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TallyError {
    #[error("caller {0} is not the owner")]
    NotOwner(Address),

    #[error("caller {0} is not a registered provider")]
    NotProvider(Address),

    #[error("protocol is paused")]
    Paused,

    #[error("protocol is not paused")]
    NotPaused,

    #[error("{0} is not open for submissions")]
    BatchNotOpen(BatchId),

    #[error("{0} has no submissions or does not exist")]
    InvalidBatch(BatchId),

    #[error("{0} is at capacity")]
    BatchFull(BatchId),

    #[error("{0} has already been submitted")]
    DuplicateMod(ModId),

    #[error("{0} has already been processed")]
    ReplayAttempt(RequestId),

    #[error("aggregate snapshot for {0} no longer matches on-chain state")]
    InvalidStateHash(RequestId),

    #[error("proof verification failed for {0}")]
    InvalidProof(RequestId),

    #[error("cooldown has not elapsed for {address} ({action})")]
    RateLimited { address: Address, action: String },

    #[error("uninitialized ciphertext handle for {0}")]
    UninitializedHandle(ModId),

    #[error("protocol is already initialized")]
    AlreadyInitialized,

    #[error("protocol is not initialized")]
    NotInitialized,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TallyError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}
