//! cardlink-sim — host simulation harness.
//!
//! Runs the engine against an in-memory card image and a scripted modem,
//! exercising one full lifecycle:
//!
//! ```text
//! app ready ──▶ record load ──▶ connect (fails once, retried) ──▶ active
//!                                   │
//!     hard reset ◀── file refresh ◀─┴── disconnect
//! ```
//!
//! The modem adapter answers every command but never inline: completions
//! are parked and drained onto the event queue after the current dispatch
//! finishes, preserving the issue/complete two-step the real channel has.

#![deny(unused_must_use)]

use std::path::PathBuf;

use anyhow::Result;
use log::{info, warn, LevelFilter};

use cardlink::app::commands::AppCommand;
use cardlink::app::events::AppEvent;
use cardlink::app::ports::{
    ConfigError, ConfigPort, EventSink, LocaleResolver, PropertySink, TransportPort,
};
use cardlink::app::service::CardService;
use cardlink::config::SystemConfig;
use cardlink::error::TransportError;
use cardlink::events::{Event, EventQueue};
use cardlink::records::codec;
use cardlink::refresh::{RefreshEvent, RefreshKind};
use cardlink::session::ConnectParams;
use cardlink::transport::{
    Command, CorrelationId, FileKind, Outcome, Response, SessionInfo,
};

const AID: &str = "A0000003431002";

// ── Simulated modem ───────────────────────────────────────────

/// In-memory card image plus a scripted radio.  The first session setup
/// times out; later ones succeed.
struct SimModem {
    next_id: u32,
    setup_attempts: u32,
    /// Completions parked until the dispatch loop drains them.
    parked: Vec<(CorrelationId, Outcome)>,
}

impl SimModem {
    fn new() -> Self {
        Self {
            next_id: 0,
            setup_attempts: 0,
            parked: Vec::new(),
        }
    }

    /// Move parked completions onto the event queue.
    fn drain_into(&mut self, queue: &mut EventQueue) {
        for (id, outcome) in self.parked.drain(..) {
            let _ = queue.push(Event::TransportResult { id, outcome });
        }
    }

    fn answer(&mut self, command: &Command) -> Outcome {
        match command {
            Command::ReadImsi => Ok(Response::Imsi(small_str("310004123456789"))),
            Command::ReadTransparent { file, .. } => Ok(Response::Data(file_image(*file))),
            Command::ReadRecord {
                file: FileKind::CsimMdn,
                ..
            } => Ok(Response::Data(mdn_record())),
            Command::ReadRecord { .. } => Err(TransportError::Malformed),
            Command::ReadAllRecords {
                file: FileKind::CsimCdmaHome,
            } => Ok(Response::Records(cdma_home_records())),
            Command::ReadAllRecords { .. } => Err(TransportError::Malformed),
            Command::ReadSubscription => Ok(Response::Subscription {
                mdn: small_str("5551234567"),
                min: small_str("1234567890"),
                prl_version: small_str("300"),
            }),
            Command::SetupSession(req) => {
                self.setup_attempts += 1;
                if self.setup_attempts == 1 {
                    Err(TransportError::Timeout)
                } else {
                    info!("modem: accepting session for APN '{}'", req.apn);
                    let mut session = SessionInfo {
                        cid: 1,
                        ..SessionInfo::default()
                    };
                    session.address = small_str("10.32.4.17");
                    let _ = session.dns.push(small_str("198.51.100.1"));
                    Ok(Response::SetupDone(session))
                }
            }
            Command::TeardownSession { .. } => Ok(Response::TeardownDone),
            Command::RadioPower { .. } => Ok(Response::PowerDone),
        }
    }
}

impl TransportPort for SimModem {
    fn send(&mut self, command: Command) -> CorrelationId {
        self.next_id += 1;
        let id = CorrelationId(self.next_id);
        let outcome = self.answer(&command);
        self.parked.push((id, outcome));
        id
    }
}

fn small_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    let _ = out.push_str(s);
    out
}

fn file_image(file: FileKind) -> heapless::Vec<u8, { cardlink::transport::MAX_FILE_BYTES }> {
    let mut out = heapless::Vec::new();
    let bytes: &[u8] = match file {
        // "89014103211118510720", swapped-nibble BCD
        FileKind::Iccid => &[0x98, 0x10, 0x14, 0x30, 0x12, 0x11, 0x81, 0x15, 0x70, 0x02],
        FileKind::PreferredLanguages => b"enes",
        // EF_CSIM_LI entries: second byte is the language code (0x01 = en)
        FileKind::CsimLanguage => &[0x00, 0x01, 0x00, 0x03],
        // display condition set, Latin encoding, "Cardlink"
        FileKind::CsimServiceName => &[
            0x01, 0x00, 0x00, b'C', b'a', b'r', b'd', b'l', b'i', b'n', b'k', 0xFF,
        ],
        // MIN "1234567890", provisioned
        FileKind::CsimImsiM => &[0x00, 0x0C, 0x00, 0xBB, 0x5E, 0x56, 0x00, 0x80],
        // PRL version 300 in the header
        FileKind::CsimEprl => &[0x00, 0x00, 0x01, 0x2C],
        FileKind::CsimMdn | FileKind::CsimCdmaHome => &[],
    };
    let _ = out.extend_from_slice(bytes);
    out
}

fn mdn_record() -> heapless::Vec<u8, { cardlink::transport::MAX_FILE_BYTES }> {
    // 10 digits, "5551234567" in CDMA BCD
    let mut out = heapless::Vec::new();
    let _ = out.extend_from_slice(&[0x0A, 0x55, 0x15, 0x32, 0x54, 0x76]);
    out
}

fn cdma_home_records() -> heapless::Vec<
    heapless::Vec<u8, { cardlink::transport::MAX_RECORD_BYTES }>,
    { cardlink::transport::MAX_RECORDS },
> {
    codec::encode_cdma_home(&[4139], &[65_535])
}

// ── Config persistence ────────────────────────────────────────

/// File-backed configuration store, postcard on disk.
struct FileConfigStore {
    path: PathBuf,
}

impl ConfigPort for FileConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound)
            }
            Err(_) => return Err(ConfigError::IoError),
        };
        let config: SystemConfig =
            postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate().map_err(ConfigError::ValidationFailed)?;
        Ok(config)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        std::fs::write(&self.path, bytes).map_err(|_| ConfigError::IoError)
    }
}

// ── Host-side sinks ───────────────────────────────────────────

/// Logs everything the engine reports.
struct LogHost;

impl EventSink for LogHost {
    fn emit(&mut self, event: &AppEvent) {
        info!("event: {event:?}");
    }
}

impl PropertySink for LogHost {
    fn set_operator_numeric(&mut self, numeric: &str) {
        info!("property: operator numeric = {numeric}");
    }
    fn set_iso_country(&mut self, country: &str) {
        info!("property: ISO country = {country}");
    }
    fn set_locale(&mut self, language: &str, country: &str) {
        info!("property: locale = {language}_{country}");
    }
    fn set_service_name(&mut self, name: &str) {
        info!("property: service name = {name}");
    }
}

/// Static North-American lookup tables.
struct UsLocale;

impl LocaleResolver for UsLocale {
    fn country_for_mcc(&self, mcc: u16) -> Option<&'static str> {
        match mcc {
            310..=316 => Some("us"),
            302 => Some("ca"),
            _ => None,
        }
    }

    fn mnc_length(&self, mcc: u16) -> u8 {
        match mcc {
            310..=316 => 3,
            _ => 2,
        }
    }

    fn supports_language(&self, language: &str) -> bool {
        matches!(language, "en" | "es" | "fr")
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .init();

    info!("cardlink-sim v{}", env!("CARGO_PKG_VERSION"));

    let store = FileConfigStore {
        path: std::env::temp_dir().join("cardlink-sim.cfg"),
    };
    let config = match store.load() {
        Ok(config) => {
            info!("configuration loaded from {}", store.path.display());
            config
        }
        Err(e) => {
            info!("stored configuration unusable ({e}), using defaults");
            let defaults = SystemConfig::default();
            if let Err(e) = store.save(&defaults) {
                warn!("could not persist defaults: {e}");
            }
            defaults
        }
    };

    let mut modem = SimModem::new();
    let mut host = LogHost;
    let locale = UsLocale;
    let mut queue = EventQueue::new();
    let mut service =
        CardService::new(config, AID).map_err(|e| anyhow::anyhow!("service init: {e}"))?;

    // 1. Card application comes up; the full record batch goes out.
    let _ = queue.push(Event::AppReady);
    pump(&mut service, &mut queue, &mut modem, &mut host, &locale);
    anyhow::ensure!(service.records().is_some(), "record load did not finish");
    anyhow::ensure!(service.is_provisioned(), "card should be provisioned");

    // 2. Connect.  The modem drops the first attempt; the retry policy
    //    schedules another, which the host timer would normally deliver.
    let mut params = ConnectParams::new("internet.example");
    params.user = small_str("user");
    params.password = small_str("secret");
    service.handle_command(AppCommand::Connect(params), &mut modem, &mut host);
    pump(&mut service, &mut queue, &mut modem, &mut host, &locale);

    info!("host: retry window elapsed");
    let _ = queue.push(Event::RetryWindowElapsed);
    pump(&mut service, &mut queue, &mut modem, &mut host, &locale);
    anyhow::ensure!(
        service.session_state() == cardlink::session::SessionState::Active,
        "session should be active after retry"
    );

    // 3. Card announces a file update mid-session; records reload while
    //    the session stays up.
    let _ = queue.push(Event::Refresh(RefreshEvent::for_app(
        RefreshKind::FileUpdate,
        AID,
    )));
    pump(&mut service, &mut queue, &mut modem, &mut host, &locale);

    // 4. Orderly teardown, then a hard reset.
    service.handle_command(AppCommand::Disconnect, &mut modem, &mut host);
    pump(&mut service, &mut queue, &mut modem, &mut host, &locale);
    service.handle_command(AppCommand::HardReset, &mut modem, &mut host);
    pump(&mut service, &mut queue, &mut modem, &mut host, &locale);

    info!("simulation complete");
    Ok(())
}


/// Dispatch until both the queue and the modem's parked completions are
/// exhausted.
fn pump(
    service: &mut CardService,
    queue: &mut EventQueue,
    modem: &mut SimModem,
    host: &mut LogHost,
    locale: &UsLocale,
) {
    loop {
        modem.drain_into(queue);
        let Some(event) = queue.pop() else {
            if modem.parked.is_empty() {
                return;
            }
            continue;
        };
        service.handle_event(event, modem, host, locale);
    }
}
