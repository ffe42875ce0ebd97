// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::{Actor, Addr};
use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use mt_data::{DataStore, InMemStore, RepositoriesFactory};
use mt_events::{
    new_event_bus_with_history, EventBus, GetEvents, HistoryCollector, RequestId, TallyEvent,
};
use mt_fhe::PlainArithmetic;
use mt_guard::SimClock;
use mt_oracle::SimOracle;
use mt_protocol::{DecryptionCallback, Tally, TallyNode, TallyParams};
use std::sync::Arc;

pub const TEST_COOLDOWN_SECS: u64 = 60;
pub const TEST_MAX_BATCH_SIZE: u64 = 100;

/// A fully wired node over the simulated capabilities. Tests drive it through
/// the actor mailbox and assert on the events collected from the bus.
pub struct TallyHarness {
    pub node: Addr<TallyNode>,
    pub bus: Addr<EventBus<TallyEvent>>,
    pub history: Addr<HistoryCollector<TallyEvent>>,
    pub store: Addr<InMemStore>,
    pub oracle: Arc<SimOracle>,
    pub clock: Arc<SimClock>,
    pub owner: Address,
    pub deployment: Address,
}

impl TallyHarness {
    pub fn new(owner: Address) -> Result<Self> {
        let deployment = crate::rand_eth_addr();
        let oracle = Arc::new(SimOracle::new());
        let clock = Arc::new(SimClock::new(1_000));

        let tally = Tally::new(TallyParams {
            owner,
            deployment,
            cooldown_secs: TEST_COOLDOWN_SECS,
            max_batch_size: TEST_MAX_BATCH_SIZE,
            arith: Arc::new(PlainArithmetic),
            oracle: oracle.clone(),
            clock: clock.clone(),
        })?;

        let (bus, history) = new_event_bus_with_history::<TallyEvent>();
        let store = InMemStore::new(true).start();
        let repositories = DataStore::from(&store).repositories();
        let node = TallyNode::attach(tally, bus.clone(), Some(repositories));

        Ok(Self {
            node,
            bus,
            history,
            store,
            oracle,
            clock,
            owner,
            deployment,
        })
    }

    /// Everything published on the bus so far.
    pub async fn events(&self) -> Result<Vec<TallyEvent>> {
        Ok(self.history.send(GetEvents::<TallyEvent>::new()).await?)
    }

    /// Act as the external oracle: decrypt the stored ciphertext for the
    /// request and package the result as the callback the node expects.
    pub fn play_oracle(&self, request_id: RequestId) -> Result<DecryptionCallback> {
        let ciphertext = self
            .oracle
            .ciphertext_for(request_id)
            .ok_or_else(|| anyhow!("no ciphertext stored for {request_id}"))?;
        let total = PlainArithmetic::decode(&ciphertext)?;
        let cleartext = total.to_le_bytes().to_vec();
        let proof = self.oracle.prove(request_id, &cleartext);
        Ok(DecryptionCallback {
            request_id,
            cleartext,
            proof,
        })
    }
}
