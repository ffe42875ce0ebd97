// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identifier stamped on every published notification. The preimage mixes
/// the event kind, the payload hash and a process-local sequence number, so
/// two distinct notifications never share an id even when their payloads are
/// field-for-field identical (a pause and an unpause by the same owner, a
/// repeated error). The bus dedup therefore only drops re-deliveries of the
/// same published event, never a fresh one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub [u8; 32]);

impl EventId {
    pub fn hash<T: Hash>(kind: &str, payload: T) -> Self {
        let mut payload_hasher = DefaultHasher::new();
        payload.hash(&mut payload_hasher);

        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(payload_hasher.finish().to_le_bytes());
        hasher.update(NEXT_SEQ.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        EventId(hasher.finalize().into())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base58_string = bs58::encode(&self.0).into_string();
        write!(f, "tev:{}", &base58_string[0..8])
    }
}
