// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::DecryptionOracle;
use alloy_primitives::keccak256;
use anyhow::Result;
use mt_events::RequestId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Scripted oracle for tests: assigns sequential request ids, remembers the
/// submitted ciphertexts, and accepts exactly the proofs produced by
/// [`prove`](SimOracle::prove).
#[derive(Default)]
pub struct SimOracle {
    next_id: AtomicU64,
    requests: Mutex<HashMap<RequestId, Vec<u8>>>,
}

impl SimOracle {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Ciphertext submitted under `request_id`, if any. Used by test
    /// harnesses to play the oracle's decryption role.
    pub fn ciphertext_for(&self, request_id: RequestId) -> Option<Vec<u8>> {
        self.requests
            .lock()
            .ok()
            .and_then(|reqs| reqs.get(&request_id).cloned())
    }

    /// Produce the proof this oracle considers valid for a callback.
    pub fn prove(&self, request_id: RequestId, cleartext: &[u8]) -> Vec<u8> {
        Self::proof_bytes(request_id, cleartext)
    }

    fn proof_bytes(request_id: RequestId, cleartext: &[u8]) -> Vec<u8> {
        let mut preimage = b"mt-sim-proof".to_vec();
        preimage.extend_from_slice(&request_id.value().to_be_bytes());
        preimage.extend_from_slice(cleartext);
        keccak256(&preimage).to_vec()
    }
}

impl DecryptionOracle for SimOracle {
    fn request_decryption(&self, ciphertext: Vec<u8>) -> Result<RequestId> {
        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.insert(id, ciphertext);
        }
        Ok(id)
    }

    fn verify_proof(&self, request_id: RequestId, cleartext: &[u8], proof: &[u8]) -> bool {
        proof == Self::proof_bytes(request_id, cleartext)
    }
}
