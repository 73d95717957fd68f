//! Unified error types for the cardlink engine.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! event-loop's error handling uniform.  All variants are `Copy` so they can
//! be cheaply threaded through the loader and session machine without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the engine funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The transport channel reported a failure.
    Transport(TransportError),
    /// A card file payload could not be decoded.
    Decode(DecodeError),
    /// A session attempt terminated with a failure cause.
    Session(FailCause),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

/// Failure codes a transport completion may carry.  The channel performs no
/// retries of its own; policy lives with the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The radio/modem link is down or not yet initialised.
    Unavailable,
    /// The command did not complete within the channel's deadline.
    Timeout,
    /// The response arrived but could not be framed/parsed by the channel.
    Malformed,
    /// The card was removed while the command was outstanding.
    CardRemoved,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "channel unavailable"),
            Self::Timeout => write!(f, "command timed out"),
            Self::Malformed => write!(f, "malformed response"),
            Self::CardRemoved => write!(f, "card removed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Record decode errors
// ---------------------------------------------------------------------------

/// Per-file decode failures.  These are always recovered locally: the field
/// stays absent and the load batch continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload shorter than the file layout requires.
    Truncated,
    /// A fixed-length record had the wrong length.
    BadLength,
    /// A linear-fixed file returned zero records.
    EmptyFile,
    /// Text payload used an encoding we do not support.
    UnsupportedEncoding,
    /// A digit field held a non-decimal value.
    InvalidDigits,
    /// Decoded value exceeds its fixed-capacity buffer.
    CapacityExceeded,
    /// The response payload type did not match the file kind.
    WrongPayload,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "payload truncated"),
            Self::BadLength => write!(f, "bad record length"),
            Self::EmptyFile => write!(f, "empty file"),
            Self::UnsupportedEncoding => write!(f, "unsupported encoding"),
            Self::InvalidDigits => write!(f, "invalid digits"),
            Self::CapacityExceeded => write!(f, "capacity exceeded"),
            Self::WrongPayload => write!(f, "payload kind mismatch"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Session failure causes
// ---------------------------------------------------------------------------

/// Terminal failure cause of a connection attempt.  Set at most once per
/// attempt; `None` while the attempt has not failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailCause {
    #[default]
    None,
    /// Radio/modem link unavailable when setup was issued.
    RadioUnavailable,
    /// The network rejected the credentials.
    AuthenticationRejected,
    /// The network refused the session for a non-auth reason.
    NetworkRejected,
    /// Requested protocol (or returned addressing) is unusable.
    ProtocolMismatch,
    /// Setup command timed out.
    Timeout,
}

impl FailCause {
    /// Permanent causes are never auto-retried; the failure is surfaced to
    /// the caller instead.
    pub const fn is_permanent(self) -> bool {
        matches!(self, Self::AuthenticationRejected)
    }
}

impl fmt::Display for FailCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::RadioUnavailable => write!(f, "radio unavailable"),
            Self::AuthenticationRejected => write!(f, "authentication rejected"),
            Self::NetworkRejected => write!(f, "network rejected"),
            Self::ProtocolMismatch => write!(f, "protocol mismatch"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl From<TransportError> for FailCause {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unavailable | TransportError::CardRemoved => Self::RadioUnavailable,
            TransportError::Timeout => Self::Timeout,
            TransportError::Malformed => Self::ProtocolMismatch,
        }
    }
}

impl From<FailCause> for Error {
    fn from(e: FailCause) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
