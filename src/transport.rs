//! Transport channel contract.
//!
//! The engine talks to the radio/modem peripheral through an abstract
//! command/response channel:
//!
//! ```text
//! ┌─────────────┐  send(Command) -> CorrelationId  ┌──────────────┐
//! │ CardService │ ────────────────────────────────▶│  Transport   │
//! │  (domain)   │ ◀──────────────────────────────── │  (adapter)   │
//! └─────────────┘  Event::TransportResult{id, ..}  └──────────────┘
//! ```
//!
//! Completions are never delivered inline: the adapter posts a
//! [`TransportResult`](crate::events::Event::TransportResult) onto the one
//! event queue, so command issue and completion handling are always two
//! separate dispatch steps.  The channel owns its own deadlines; it performs
//! no retries.

use core::fmt;

use crate::error::TransportError;

/// Ticket identifying one issued command.  Monotonically increasing per
/// channel; used to pair completions with requests and to discard stale
/// deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub u32);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Elementary-file catalogue
// ---------------------------------------------------------------------------

/// Card files the loader knows how to fetch and decode.
/// Discriminants are the on-card EF identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FileKind {
    Iccid = 0x2FE2,
    PreferredLanguages = 0x2F05,
    CsimLanguage = 0x6F3A,
    CsimServiceName = 0x6F41,
    CsimMdn = 0x6F44,
    CsimImsiM = 0x6F22,
    CsimCdmaHome = 0x6F28,
    CsimEprl = 0x6F5A,
}

impl FileKind {
    /// EF identifier as used on the wire.
    pub const fn ef_id(self) -> u16 {
        self as u16
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Iccid => "EF_ICCID",
            Self::PreferredLanguages => "EF_PL",
            Self::CsimLanguage => "EF_CSIM_LI",
            Self::CsimServiceName => "EF_CSIM_SPN",
            Self::CsimMdn => "EF_CSIM_MDN",
            Self::CsimImsiM => "EF_CSIM_IMSIM",
            Self::CsimCdmaHome => "EF_CSIM_CDMAHOME",
            Self::CsimEprl => "EF_CSIM_EPRL",
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Maximum bytes of a transparent-file payload we ever request.
pub const MAX_FILE_BYTES: usize = 64;

/// Maximum bytes per linear-fixed record.
pub const MAX_RECORD_BYTES: usize = 16;

/// Maximum linear-fixed records per file.
pub const MAX_RECORDS: usize = 8;

/// Wire-level session setup request.  The session machine resolves its
/// [`ConnectParams`](crate::session::ConnectParams) into these concrete
/// fields before issuing the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub profile_id: u8,
    pub apn: heapless::String<32>,
    pub user: heapless::String<32>,
    pub password: heapless::String<32>,
    /// 0 = none, 1 = PAP, 2 = CHAP, 3 = PAP/CHAP.
    pub auth_code: u8,
    /// "IP", "IPV6" or "IPV4V6".
    pub protocol: heapless::String<8>,
}

/// Commands the engine can issue over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Query the card application's IMSI.
    ReadImsi,
    /// Read a whole transparent EF (optionally only the first `len` bytes).
    ReadTransparent { file: FileKind, len: Option<u8> },
    /// Read one record of a linear-fixed EF (1-based index).
    ReadRecord { file: FileKind, index: u8 },
    /// Read every record of a linear-fixed EF.
    ReadAllRecords { file: FileKind },
    /// Query the CDMA subscription tuple (MDN, MIN, PRL version).
    ReadSubscription,
    /// Establish a packet-data session.
    SetupSession(SetupRequest),
    /// Tear down the session identified by `cid`.
    TeardownSession { cid: u8 },
    /// Power the radio on or off.
    RadioPower { on: bool },
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReadImsi => "READ_IMSI",
            Self::ReadTransparent { .. } => "READ_TRANSPARENT",
            Self::ReadRecord { .. } => "READ_RECORD",
            Self::ReadAllRecords { .. } => "READ_ALL_RECORDS",
            Self::ReadSubscription => "READ_SUBSCRIPTION",
            Self::SetupSession(_) => "SETUP_SESSION",
            Self::TeardownSession { .. } => "TEARDOWN_SESSION",
            Self::RadioPower { .. } => "RADIO_POWER",
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Addressing information of an established session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionInfo {
    /// Context id assigned by the network.
    pub cid: u8,
    /// Assigned interface address.
    pub address: heapless::String<40>,
    /// DNS server addresses, in preference order.
    pub dns: heapless::Vec<heapless::String<40>, 2>,
}

/// Why the network refused a session setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AuthFailed,
    NetworkFailure,
    ProtocolUnsupported,
}

/// Decoded payload of a successful command completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// IMSI digit string.
    Imsi(heapless::String<16>),
    /// Raw bytes of a transparent EF.
    Data(heapless::Vec<u8, MAX_FILE_BYTES>),
    /// All records of a linear-fixed EF.
    Records(heapless::Vec<heapless::Vec<u8, MAX_RECORD_BYTES>, MAX_RECORDS>),
    /// CDMA subscription tuple.
    Subscription {
        mdn: heapless::String<16>,
        min: heapless::String<16>,
        prl_version: heapless::String<8>,
    },
    /// Session established.
    SetupDone(SessionInfo),
    /// Session refused by the network (channel itself worked).
    SetupRejected(RejectReason),
    /// Session torn down.
    TeardownDone,
    /// Radio power command applied.
    PowerDone,
}

/// Result of one command: decoded payload or channel failure.
pub type Outcome = core::result::Result<Response, TransportError>;
