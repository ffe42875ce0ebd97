// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use rand::Rng;

pub fn rand_eth_addr() -> Address {
    let rnum = rand::thread_rng().gen::<[u8; 20]>();
    Address::from_slice(&rnum)
}
