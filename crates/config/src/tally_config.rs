// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use mt_guard::{DEFAULT_COOLDOWN_SECS, MIN_COOLDOWN_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "modtally.config.yaml";
pub const ENV_PREFIX: &str = "MODTALLY_";
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Node configuration. Values are layered defaults < yaml file < environment
/// (`MODTALLY_*`).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Address of the deployed contract this node tracks
    pub deployment: Address,
    /// Chain the deployment lives on
    pub chain_id: u64,
    /// Per-address cooldown between rate limited actions
    pub cooldown_secs: u64,
    /// Submission capacity of a single batch
    pub max_batch_size: usize,
    /// Tracing filter directive, eg. "info" or "mt_protocol=debug"
    pub log_level: String,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            deployment: Address::ZERO,
            chain_id: 1,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl TallyConfig {
    /// Load configuration, optionally merging a yaml file over the defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(TallyConfig::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Yaml::file_exact(path));
        }

        let config: TallyConfig = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context("Failed to load configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cooldown_secs < MIN_COOLDOWN_SECS {
            bail!(
                "cooldown_secs must be at least {} but was {}",
                MIN_COOLDOWN_SECS,
                self.cooldown_secs
            );
        }
        if self.max_batch_size == 0 {
            bail!("max_batch_size must be greater than zero");
        }
        Ok(())
    }
}
