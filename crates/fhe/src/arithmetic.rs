// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque reference to an encrypted value. The only operations available on a
/// handle are the ones exposed by the [`EncryptedArithmetic`] capability; no
/// arithmetic is ever performed on handles outside that boundary.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(Vec<u8>);

impl CiphertextHandle {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({} bytes)", self.0.len())
    }
}

/// External encrypted-arithmetic capability. The real implementation lives
/// outside this repository; the in-tree [`PlainArithmetic`](crate::PlainArithmetic)
/// backend exists only for tests.
pub trait EncryptedArithmetic {
    /// Homomorphic addition of two handles.
    fn add(&self, a: &CiphertextHandle, b: &CiphertextHandle) -> Result<CiphertextHandle>;

    /// The encrypted representation of zero, used as the fold seed.
    fn zero(&self) -> CiphertextHandle;

    /// Validity marker for a handle. An uninitialized handle inside a batch
    /// is an integrity violation, never a silent skip.
    fn is_initialized(&self, handle: &CiphertextHandle) -> bool;

    /// Canonical byte representation the decryption oracle expects.
    fn to_canonical_bytes(&self, handle: &CiphertextHandle) -> Result<Vec<u8>>;
}

pub type SharedArithmetic = Arc<dyn EncryptedArithmetic + Send + Sync>;
