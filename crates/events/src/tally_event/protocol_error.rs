// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::TallyError;
use actix::Message;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Event wrapper carrying a typed protocol error on the bus so observers can
/// watch for failures without being in the call path.
#[derive(Message, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[rtype(result = "()")]
pub struct ProtocolError {
    pub error: TallyError,
}

impl ProtocolError {
    pub fn new(error: TallyError) -> Self {
        Self { error }
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtocolError({})", self.error)
    }
}

impl From<TallyError> for ProtocolError {
    fn from(error: TallyError) -> Self {
        Self { error }
    }
}
