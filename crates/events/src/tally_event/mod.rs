// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod batch_closed;
mod batch_opened;
mod cooldown_updated;
mod decryption_complete;
mod decryption_requested;
mod max_batch_size_updated;
mod mod_submitted;
mod protocol_error;
mod protocol_paused;
mod protocol_unpaused;
mod provider_added;
mod provider_removed;
mod rate_limit_triggered;

pub use batch_closed::*;
pub use batch_opened::*;
pub use cooldown_updated::*;
pub use decryption_complete::*;
pub use decryption_requested::*;
pub use max_batch_size_updated::*;
pub use mod_submitted::*;
pub use protocol_error::*;
pub use protocol_paused::*;
pub use protocol_unpaused::*;
pub use provider_added::*;
pub use provider_removed::*;
pub use rate_limit_triggered::*;

use crate::{BatchId, ErrorEvent, Event, EventId, TallyError};
use actix::Message;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self},
    hash::Hash,
};

/// Macro to help define From traits for TallyEvent
macro_rules! impl_from_event {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for TallyEvent {
                fn from(data: $variant) -> Self {
                    TallyEvent::$variant {
                        id: EventId::hash(stringify!($variant), data.clone()),
                        data,
                    }
                }
            }
        )*
    };
}

/// Every observable notification the protocol emits. Event payloads live in
/// their own structs; the enum attaches a content-addressed id used by the
/// bus for deduplication.
#[derive(Message, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[rtype(result = "()")]
pub enum TallyEvent {
    ProviderAdded {
        id: EventId,
        data: ProviderAdded,
    },
    ProviderRemoved {
        id: EventId,
        data: ProviderRemoved,
    },
    ProtocolPaused {
        id: EventId,
        data: ProtocolPaused,
    },
    ProtocolUnpaused {
        id: EventId,
        data: ProtocolUnpaused,
    },
    CooldownUpdated {
        id: EventId,
        data: CooldownUpdated,
    },
    MaxBatchSizeUpdated {
        id: EventId,
        data: MaxBatchSizeUpdated,
    },
    BatchOpened {
        id: EventId,
        data: BatchOpened,
    },
    BatchClosed {
        id: EventId,
        data: BatchClosed,
    },
    ModSubmitted {
        id: EventId,
        data: ModSubmitted,
    },
    DecryptionRequested {
        id: EventId,
        data: DecryptionRequested,
    },
    DecryptionComplete {
        id: EventId,
        data: DecryptionComplete,
    },
    RateLimitTriggered {
        id: EventId,
        data: RateLimitTriggered,
    },
    ProtocolError {
        id: EventId,
        data: ProtocolError,
    },
}

impl_from_event!(
    ProviderAdded,
    ProviderRemoved,
    ProtocolPaused,
    ProtocolUnpaused,
    CooldownUpdated,
    MaxBatchSizeUpdated,
    BatchOpened,
    BatchClosed,
    ModSubmitted,
    DecryptionRequested,
    DecryptionComplete,
    RateLimitTriggered,
    ProtocolError
);

impl TallyEvent {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn get_id(&self) -> EventId {
        self.clone().into()
    }

    /// Batch this event concerns, when it concerns one.
    pub fn batch_id(&self) -> Option<BatchId> {
        match self {
            TallyEvent::BatchOpened { data, .. } => Some(data.batch_id),
            TallyEvent::BatchClosed { data, .. } => Some(data.batch_id),
            TallyEvent::ModSubmitted { data, .. } => Some(data.batch_id),
            TallyEvent::DecryptionRequested { data, .. } => Some(data.batch_id),
            TallyEvent::DecryptionComplete { data, .. } => Some(data.batch_id),
            _ => None,
        }
    }
}

impl Event for TallyEvent {
    type Id = EventId;

    fn event_type(&self) -> String {
        let s = format!("{:?}", self);
        extract_tally_event_name(&s).to_string()
    }

    fn event_id(&self) -> Self::Id {
        self.get_id()
    }
}

impl ErrorEvent for TallyEvent {
    type Error = TallyError;

    fn as_error(&self) -> Option<&Self::Error> {
        match self {
            TallyEvent::ProtocolError { data, .. } => Some(&data.error),
            _ => None,
        }
    }

    fn from_error(error: Self::Error) -> Self {
        TallyEvent::from(ProtocolError::new(error))
    }
}

impl From<TallyEvent> for EventId {
    fn from(value: TallyEvent) -> Self {
        match value {
            TallyEvent::ProviderAdded { id, .. } => id,
            TallyEvent::ProviderRemoved { id, .. } => id,
            TallyEvent::ProtocolPaused { id, .. } => id,
            TallyEvent::ProtocolUnpaused { id, .. } => id,
            TallyEvent::CooldownUpdated { id, .. } => id,
            TallyEvent::MaxBatchSizeUpdated { id, .. } => id,
            TallyEvent::BatchOpened { id, .. } => id,
            TallyEvent::BatchClosed { id, .. } => id,
            TallyEvent::ModSubmitted { id, .. } => id,
            TallyEvent::DecryptionRequested { id, .. } => id,
            TallyEvent::DecryptionComplete { id, .. } => id,
            TallyEvent::RateLimitTriggered { id, .. } => id,
            TallyEvent::ProtocolError { id, .. } => id,
        }
    }
}

impl fmt::Display for TallyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TallyEvent::ProviderAdded { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::ProviderRemoved { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::ProtocolPaused { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::ProtocolUnpaused { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::CooldownUpdated { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::MaxBatchSizeUpdated { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::BatchOpened { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::BatchClosed { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::ModSubmitted { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::DecryptionRequested { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::DecryptionComplete { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::RateLimitTriggered { data, .. } => fmt::Display::fmt(data, f),
            TallyEvent::ProtocolError { data, .. } => fmt::Display::fmt(data, f),
        }
    }
}

fn extract_tally_event_name(s: &str) -> &str {
    let bytes = s.as_bytes();
    for (i, &item) in bytes.iter().enumerate() {
        if item == b' ' || item == b'(' || item == b'{' {
            return &s[..i];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Event;

    #[test]
    fn event_type_matches_variant_name() {
        let evt = TallyEvent::from(BatchOpened {
            batch_id: BatchId::first(),
        });
        assert_eq!(evt.event_type(), "BatchOpened");
    }

    #[test]
    fn event_bytes_round_trip() {
        let evt = TallyEvent::from(CooldownUpdated { interval_secs: 90 });
        let bytes = evt.to_bytes().unwrap();
        assert_eq!(TallyEvent::from_bytes(&bytes).unwrap(), evt);
    }

    #[test]
    fn same_payload_fields_in_different_variants_get_distinct_ids() {
        use alloy_primitives::Address;

        let owner = Address::repeat_byte(0x01);
        let added = TallyEvent::from(ProviderAdded { address: owner });
        let paused = TallyEvent::from(ProtocolPaused { by: owner });
        let unpaused = TallyEvent::from(ProtocolUnpaused { by: owner });

        assert_ne!(added.event_id(), paused.event_id());
        assert_ne!(paused.event_id(), unpaused.event_id());

        // A second pause by the same owner is a new notification, not a dup
        let paused_again = TallyEvent::from(ProtocolPaused { by: owner });
        assert_ne!(paused.event_id(), paused_again.event_id());
    }

    #[test]
    fn error_event_exposes_typed_error() {
        let evt = TallyEvent::from_error(TallyError::Paused);
        assert_eq!(evt.as_error(), Some(&TallyError::Paused));
        assert_eq!(evt.event_type(), "ProtocolError");
    }
}
