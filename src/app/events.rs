//! Outbound application events.
//!
//! The [`CardService`](super::service::CardService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them — log them, broadcast to the
//! telephony framework, record them in tests.

use crate::error::FailCause;
use crate::session::SessionState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A record load batch was issued (carries the batch generation).
    RecordLoadStarted { generation: u32 },

    /// Every request of the batch has completed; derived properties have
    /// been published.  `provisioned` reflects the subscription check.
    AllRecordsLoaded { provisioned: bool },

    /// The session machine transitioned between states.
    SessionStateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// A connection attempt failed with a terminal cause.
    SessionFailed(FailCause),

    /// A retry is pending; the host should deliver
    /// [`Event::RetryWindowElapsed`](crate::events::Event::RetryWindowElapsed)
    /// after the delay.
    RetryPending { delay_ms: u32 },

    /// The radio was powered down (hard reset or card reset refresh).
    RadioPoweredDown,
}
