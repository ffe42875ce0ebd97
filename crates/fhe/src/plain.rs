// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{CiphertextHandle, EncryptedArithmetic};
use anyhow::{bail, Result};

/// Deterministic stand-in for the external encrypted-arithmetic capability,
/// used by tests. A handle is a tagged little-endian u64; "addition" is plain
/// integer addition. Not encryption in any sense.
pub struct PlainArithmetic;

const TAG: &[u8; 4] = b"MTPL";

impl PlainArithmetic {
    pub fn encrypt(value: u64) -> CiphertextHandle {
        let mut bytes = TAG.to_vec();
        bytes.extend_from_slice(&value.to_le_bytes());
        CiphertextHandle::from_bytes(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<u64> {
        if bytes.len() != 12 || &bytes[0..4] != TAG {
            bail!("not a plain-arithmetic handle");
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[4..12]);
        Ok(u64::from_le_bytes(raw))
    }
}

impl EncryptedArithmetic for PlainArithmetic {
    fn add(&self, a: &CiphertextHandle, b: &CiphertextHandle) -> Result<CiphertextHandle> {
        let lhs = Self::decode(a.bytes())?;
        let rhs = Self::decode(b.bytes())?;
        Ok(Self::encrypt(lhs.wrapping_add(rhs)))
    }

    fn zero(&self) -> CiphertextHandle {
        Self::encrypt(0)
    }

    fn is_initialized(&self, handle: &CiphertextHandle) -> bool {
        Self::decode(handle.bytes()).is_ok()
    }

    fn to_canonical_bytes(&self, handle: &CiphertextHandle) -> Result<Vec<u8>> {
        // Canonical form and handle form coincide for the plain backend
        Ok(handle.bytes().to_vec())
    }
}
