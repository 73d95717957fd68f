//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CardService (domain)
//! ```
//!
//! Driven adapters (modem channel, property store, host notification
//! plumbing) implement these traits.  The
//! [`CardService`](super::service::CardService) consumes them at call
//! sites, so the domain core never touches the radio directly.

use crate::app::events::AppEvent;
use crate::config::SystemConfig;
use crate::transport::{Command, CorrelationId};

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → modem channel)
// ───────────────────────────────────────────────────────────────

/// Command side of the transport channel.
///
/// `send` only enqueues: the adapter returns a correlation ticket
/// immediately and posts the completion later as
/// [`Event::TransportResult`](crate::events::Event::TransportResult) on
/// the event queue.  Issue and completion are never the same dispatch
/// step, even for an adapter that could answer synchronously.
pub trait TransportPort {
    /// Issue one command.  The returned id pairs the eventual completion
    /// with this call.
    fn send(&mut self, command: Command) -> CorrelationId;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → host notifications)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (log, IPC broadcast, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Property sink port (driven adapter: domain → system properties)
// ───────────────────────────────────────────────────────────────

/// Receives the derived identity values published once a record load
/// completes.  Values are re-published on every completed load; adapters
/// should treat repeats as idempotent overwrites.
pub trait PropertySink {
    /// Operator numeric (MCC+MNC digit string).
    fn set_operator_numeric(&mut self, numeric: &str);

    /// ISO 3166 country code derived from the MCC.
    fn set_iso_country(&mut self, country: &str);

    /// Best-match UI locale from the card's language preference lists.
    fn set_locale(&mut self, language: &str, country: &str);

    /// Carrier display name, only published when the card's display
    /// condition allows it.
    fn set_service_name(&mut self, name: &str);
}

// ───────────────────────────────────────────────────────────────
// Locale resolver port (driven adapter: MCC tables, host locale list)
// ───────────────────────────────────────────────────────────────

/// Lookup tables the engine does not own: MCC geography and the set of
/// locales the host can actually render.
pub trait LocaleResolver {
    /// ISO country code for a mobile country code, if known.
    fn country_for_mcc(&self, mcc: u16) -> Option<&'static str>;

    /// Smallest number of MNC digits used in the given country (2 or 3).
    fn mnc_length(&self, mcc: u16) -> u8;

    /// Whether the host supports a two-letter language code.
    fn supports_language(&self, language: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists engine configuration.
///
/// Implementations MUST validate before persisting: invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.  First boot (nothing
    /// stored yet) reports [`ConfigError::NotFound`]; callers fall back
    /// to [`SystemConfig::default()`].
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
