// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod client;
mod context;
mod oracle;

pub use client::*;
pub use context::*;
pub use oracle::*;

#[cfg(any(test, feature = "test-helpers"))]
mod sim;

#[cfg(any(test, feature = "test-helpers"))]
pub use sim::*;
