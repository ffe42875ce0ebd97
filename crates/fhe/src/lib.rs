// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod aggregator;
mod arithmetic;

pub use aggregator::*;
pub use arithmetic::*;

#[cfg(any(test, feature = "test-helpers"))]
mod plain;

#[cfg(any(test, feature = "test-helpers"))]
pub use plain::*;
