// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use mt_events::RequestId;
use std::sync::Arc;

/// External decryption-oracle capability. Submitting a request returns an
/// oracle-assigned request id; the result arrives later through the
/// protocol's callback entry point correlated by that id. Proof verification
/// is likewise delegated here, never reimplemented.
pub trait DecryptionOracle {
    /// Submit the canonical ciphertext bytes for asynchronous decryption.
    fn request_decryption(&self, ciphertext: Vec<u8>) -> Result<RequestId>;

    /// Verify the oracle's correctness proof over `(request_id, cleartext)`.
    fn verify_proof(&self, request_id: RequestId, cleartext: &[u8], proof: &[u8]) -> bool;
}

pub type SharedOracle = Arc<dyn DecryptionOracle + Send + Sync>;
