// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use mt_events::TallyError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::info;

/// Hard floor for the cooldown interval. The owner may raise the interval but
/// can never configure it below this, so the limiter cannot be disabled.
pub const MIN_COOLDOWN_SECS: u64 = 30;

/// Interval applied until the owner configures one.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Kinds of guarded actions. Cooldowns are tracked per (address, action)
/// pair, so submitting and requesting decryption rate-limit independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Submit,
    RequestDecryption,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Submit => write!(f, "submit"),
            ActionKind::RequestDecryption => write!(f, "request_decryption"),
        }
    }
}

/// Owner/provider role checks, the global pause switch and per-address
/// per-action cooldown enforcement. Mutated only through its methods; callers
/// emit the role/pause transition events.
///
/// Cooldown checking and stamping are separate steps: the engine checks every
/// precondition of a call before committing any mutation, so a call that
/// fails a later check never consumes the caller's cooldown slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessGuard {
    owner: Address,
    providers: HashSet<Address>,
    paused: bool,
    cooldown_secs: u64,
    last_activity: HashMap<(Address, ActionKind), u64>,
}

impl AccessGuard {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            providers: HashSet::new(),
            paused: false,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            last_activity: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, addr: Address) -> bool {
        self.owner == addr
    }

    pub fn is_provider(&self, addr: Address) -> bool {
        self.providers.contains(&addr)
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    pub fn ensure_owner(&self, addr: Address) -> Result<(), TallyError> {
        if !self.is_owner(addr) {
            return Err(TallyError::NotOwner(addr));
        }
        Ok(())
    }

    pub fn ensure_provider(&self, addr: Address) -> Result<(), TallyError> {
        if !self.is_provider(addr) {
            return Err(TallyError::NotProvider(addr));
        }
        Ok(())
    }

    pub fn ensure_not_paused(&self) -> Result<(), TallyError> {
        if self.paused {
            return Err(TallyError::Paused);
        }
        Ok(())
    }

    /// Owner-only pause toggle. Toggling to the current state is rejected.
    pub fn set_paused(&mut self, caller: Address, paused: bool) -> Result<(), TallyError> {
        self.ensure_owner(caller)?;
        if self.paused == paused {
            return Err(if paused {
                TallyError::Paused
            } else {
                TallyError::NotPaused
            });
        }
        self.paused = paused;
        info!(paused, "pause switch toggled");
        Ok(())
    }

    pub fn add_provider(&mut self, caller: Address, addr: Address) -> Result<(), TallyError> {
        self.ensure_owner(caller)?;
        self.providers.insert(addr);
        Ok(())
    }

    pub fn remove_provider(&mut self, caller: Address, addr: Address) -> Result<(), TallyError> {
        self.ensure_owner(caller)?;
        self.providers.remove(&addr);
        Ok(())
    }

    /// Owner-only. Values below [`MIN_COOLDOWN_SECS`] are rejected rather
    /// than silently clamped so a misconfiguration is visible to the caller.
    pub fn set_cooldown_secs(&mut self, caller: Address, secs: u64) -> Result<(), TallyError> {
        self.ensure_owner(caller)?;
        if secs < MIN_COOLDOWN_SECS {
            return Err(TallyError::invalid_request(format!(
                "cooldown interval {}s is below the protocol floor of {}s",
                secs, MIN_COOLDOWN_SECS
            )));
        }
        self.cooldown_secs = secs;
        Ok(())
    }

    /// Reject if the cooldown interval has not elapsed since the caller's
    /// last stamped activity for this action.
    pub fn ensure_cooldown(
        &self,
        addr: Address,
        action: ActionKind,
        now: u64,
    ) -> Result<(), TallyError> {
        if let Some(last) = self.last_activity.get(&(addr, action)) {
            if now.saturating_sub(*last) < self.cooldown_secs {
                return Err(TallyError::RateLimited {
                    address: addr,
                    action: action.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Record the caller's activity. Called once all other preconditions of
    /// the guarded call have passed.
    pub fn stamp(&mut self, addr: Address, action: ActionKind, now: u64) {
        self.last_activity.insert((addr, action), now);
    }
}
