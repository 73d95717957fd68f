//! Card refresh / invalidation notifications.
//!
//! The card (or the toolkit application running on it) can announce that
//! files changed behind our back, that the application restarted, or that
//! the whole card is about to reset.  The engine reacts by re-running the
//! record load or by powering the radio down; see
//! [`CardService`](crate::app::service::CardService) for the dispatch.

/// Application identity a refresh may be scoped to (card AID, hex string).
pub type AppId = heapless::String<32>;

/// What kind of refresh the card announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// One or more files changed; cached records are stale.
    FileUpdate,
    /// The application re-initialised; reload everything.
    Init,
    /// The card is resetting; power the radio down and wait for the host.
    Reset,
}

/// An out-of-band refresh notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEvent {
    pub kind: RefreshKind,
    /// When present, the refresh applies only to this application.
    /// Events for other applications are ignored entirely.
    pub target: Option<AppId>,
}

impl RefreshEvent {
    pub fn new(kind: RefreshKind) -> Self {
        Self { kind, target: None }
    }

    pub fn for_app(kind: RefreshKind, aid: &str) -> Self {
        let mut target = AppId::new();
        // Char-wise so an oversized identity truncates on a boundary.
        for ch in aid.chars() {
            if target.push(ch).is_err() {
                break;
            }
        }
        Self {
            kind,
            target: Some(target),
        }
    }

    /// Whether this event applies to the application identified by `aid`.
    /// An absent filter matches everything.
    pub fn applies_to(&self, aid: &str) -> bool {
        match &self.target {
            None => true,
            Some(t) => t.as_str() == aid,
        }
    }
}
