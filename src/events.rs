//! Serialized event system.
//!
//! Events are produced by:
//! - The transport adapter (command completions)
//! - Out-of-band card notifications (refresh/invalidation)
//! - The host (app-ready, retry timer expiry)
//!
//! Events are consumed by one dispatch function
//! ([`CardService::handle_event`](crate::app::service::CardService)),
//! which processes them one at a time, in arrival order.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Transport done  │────▶│              │     │               │
//! │ Card refresh    │────▶│  EventQueue  │────▶│  CardService  │
//! │ Host timer/API  │────▶│  (bounded)   │     │  (consumer)   │
//! └─────────────────┘     └──────────────┘     └───────────────┘
//! ```
//!
//! This replaces a platform message loop: every completion, refresh and
//! external call is serialized through the queue, so no state is ever
//! touched from two logical threads.

use log::warn;

use crate::refresh::RefreshEvent;
use crate::transport::{CorrelationId, Outcome};

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 32;

/// Everything that can reach the engine, as one tagged variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The card application became ready; kick off the initial load.
    AppReady,
    /// A transport command completed.
    TransportResult {
        id: CorrelationId,
        outcome: Outcome,
    },
    /// Out-of-band card refresh notification.
    Refresh(RefreshEvent),
    /// The host's retry timer elapsed; re-drive a pending reconnect.
    RetryWindowElapsed,
}

impl Event {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppReady => "APP_READY",
            Self::TransportResult { .. } => "TRANSPORT_RESULT",
            Self::Refresh(_) => "REFRESH",
            Self::RetryWindowElapsed => "RETRY_WINDOW_ELAPSED",
        }
    }
}

/// Bounded FIFO queue of [`Event`]s with a single consumer.
///
/// Producers push, the dispatch loop pops.  A full queue drops the new
/// event with a warning rather than blocking — the transport's own
/// timeout machinery will resurface anything critical.
#[derive(Default)]
pub struct EventQueue {
    inner: heapless::Deque<Event, EVENT_QUEUE_CAP>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: heapless::Deque::new(),
        }
    }

    /// Enqueue an event.  Returns `false` if the queue was full and the
    /// event was dropped.
    pub fn push(&mut self, event: Event) -> bool {
        match self.inner.push_back(event) {
            Ok(()) => true,
            Err(ev) => {
                warn!("event queue full, dropping {}", ev.name());
                false
            }
        }
    }

    /// Dequeue the oldest pending event.
    pub fn pop(&mut self) -> Option<Event> {
        self.inner.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}
