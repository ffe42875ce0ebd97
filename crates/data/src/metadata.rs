// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use mt_events::ModId;
use serde::{Deserialize, Serialize};

use crate::{DataStore, Repository};

/// Human-readable record kept alongside an encrypted submission. The ledger
/// itself only holds opaque ciphertext handles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModMetadata {
    pub name: String,
    pub description: String,
    pub submitter: Address,
}

pub struct Repositories {
    pub store: DataStore,
}

impl Repositories {
    pub fn new(store: DataStore) -> Self {
        Repositories { store }
    }

    pub fn mod_meta(&self, mod_id: &ModId) -> Repository<ModMetadata> {
        Repository::new(self.store.base("//mods").scope(mod_id))
    }
}

impl From<DataStore> for Repositories {
    fn from(value: DataStore) -> Self {
        Repositories { store: value }
    }
}

impl From<&DataStore> for Repositories {
    fn from(value: &DataStore) -> Self {
        Repositories {
            store: value.clone(),
        }
    }
}

pub trait RepositoriesFactory {
    fn repositories(&self) -> Repositories;
}

impl RepositoriesFactory for DataStore {
    fn repositories(&self) -> Repositories {
        self.into()
    }
}
