// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `directive` is the fallback filter
/// used when `RUST_LOG` is not set.
pub fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive.to_string()));

    let _ = fmt().with_env_filter(filter).try_init();
}
