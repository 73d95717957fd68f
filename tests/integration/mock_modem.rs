//! Mock modem adapter for integration tests.
//!
//! Records every command so tests can assert on the full history, and
//! answers from a programmable card image without touching a real
//! channel.  Completions are parked and handed back explicitly — the
//! tests decide delivery order, which is the whole point.

use cardlink::app::events::AppEvent;
use cardlink::app::ports::{EventSink, LocaleResolver, PropertySink, TransportPort};
use cardlink::error::TransportError;
use cardlink::transport::{Command, CorrelationId, FileKind, Outcome, Response, SessionInfo};

// ── MockModem ─────────────────────────────────────────────────

pub struct MockModem {
    next_id: u32,
    pub sent: Vec<(CorrelationId, Command)>,
}

#[allow(dead_code)]
impl MockModem {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            sent: Vec::new(),
        }
    }

    pub fn last_id(&self) -> CorrelationId {
        self.sent.last().map(|(id, _)| *id).expect("nothing sent")
    }

    /// Id of the most recent command matching `pred`.
    pub fn id_of(&self, pred: impl Fn(&Command) -> bool) -> Option<CorrelationId> {
        self.sent
            .iter()
            .rev()
            .find(|(_, c)| pred(c))
            .map(|(id, _)| *id)
    }

    pub fn count_of(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.sent.iter().filter(|(_, c)| pred(c)).count()
    }
}

impl Default for MockModem {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportPort for MockModem {
    fn send(&mut self, command: Command) -> CorrelationId {
        self.next_id += 1;
        let id = CorrelationId(self.next_id);
        self.sent.push((id, command));
        id
    }
}

// ── Canned outcomes ───────────────────────────────────────────

#[allow(dead_code)]
pub fn imsi_ok(digits: &str) -> Outcome {
    let mut s = heapless::String::new();
    s.push_str(digits).unwrap();
    Ok(Response::Imsi(s))
}

#[allow(dead_code)]
pub fn data_of(bytes: &[u8]) -> Outcome {
    let mut v = heapless::Vec::new();
    v.extend_from_slice(bytes).unwrap();
    Ok(Response::Data(v))
}

#[allow(dead_code)]
pub fn setup_done(cid: u8, dns: &[&str]) -> Outcome {
    let mut info = SessionInfo {
        cid,
        ..SessionInfo::default()
    };
    info.address.push_str("10.0.0.2").unwrap();
    for server in dns {
        let mut s = heapless::String::new();
        s.push_str(server).unwrap();
        info.dns.push(s).unwrap();
    }
    Ok(Response::SetupDone(info))
}

/// Answer the whole outstanding batch: IMSI and EPRL succeed, the
/// subscription answers, everything else fails with `fill`.
#[allow(dead_code)]
pub fn answer_batch(modem: &MockModem, skip: usize, fill: TransportError) -> Vec<(CorrelationId, Outcome)> {
    modem
        .sent
        .iter()
        .skip(skip)
        .map(|(id, cmd)| {
            let outcome = match cmd {
                Command::ReadImsi => imsi_ok("310004123456789"),
                Command::ReadTransparent {
                    file: FileKind::CsimEprl,
                    ..
                } => data_of(&[0x00, 0x00, 0x01, 0x2C]),
                Command::ReadSubscription => {
                    let mut mdn = heapless::String::new();
                    mdn.push_str("5551234567").unwrap();
                    let mut min = heapless::String::new();
                    min.push_str("1234567890").unwrap();
                    Ok(Response::Subscription {
                        mdn,
                        min,
                        prl_version: heapless::String::new(),
                    })
                }
                _ => Err(fill),
            };
            (*id, outcome)
        })
        .collect()
}

// ── Recorder (EventSink + PropertySink) ───────────────────────

/// Captures emitted events and published properties for assertions.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<AppEvent>,
    pub numeric: Option<String>,
    pub country: Option<String>,
    pub locale: Option<(String, String)>,
    pub service_name: Option<String>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

impl PropertySink for Recorder {
    fn set_operator_numeric(&mut self, numeric: &str) {
        self.numeric = Some(numeric.into());
    }

    fn set_iso_country(&mut self, country: &str) {
        self.country = Some(country.into());
    }

    fn set_locale(&mut self, language: &str, country: &str) {
        self.locale = Some((language.into(), country.into()));
    }

    fn set_service_name(&mut self, name: &str) {
        self.service_name = Some(name.into());
    }
}

// ── Static locale tables ──────────────────────────────────────

pub struct TestLocale;

impl LocaleResolver for TestLocale {
    fn country_for_mcc(&self, mcc: u16) -> Option<&'static str> {
        match mcc {
            310..=316 => Some("us"),
            440 => Some("jp"),
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
        matches!(language, "en" | "es" | "ja")
    }
}
