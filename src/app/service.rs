//! Card service — the hexagonal core.
//!
//! [`CardService`] owns the record loader, the session machine and the
//! subscription cache, and is the single consumer of the event queue.
//! All I/O flows through port traits injected at call sites, making the
//! entire service testable with mock adapters.
//!
//! ```text
//! TransportPort ◀── ┌─────────────────────────────┐ ──▶ EventSink
//!                   │         CardService          │
//!     Event ──────▶ │  Loader · Session · Refresh  │ ──▶ PropertySink
//!                   └─────────────────────────────┘
//! ```

use log::{debug, info, trace, warn};

use crate::config::SystemConfig;
use crate::error::Error;
use crate::events::Event;
use crate::records::{Field, FieldValue, RecordLoader, RecordSet};
use crate::refresh::{AppId, RefreshEvent, RefreshKind};
use crate::session::retry::RetryDecision;
use crate::session::{SessionMachine, SessionOutcome, SessionState};
use crate::transport::{Command, CorrelationId, Outcome, Response};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{EventSink, LocaleResolver, PropertySink, TransportPort};

/// CDMA subscription tuple, queried beside the file batch.  Not part of
/// the batch count: a load completes whether or not this has answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub mdn: heapless::String<16>,
    pub min: heapless::String<16>,
    pub prl_version: heapless::String<8>,
}

// ───────────────────────────────────────────────────────────────
// CardService
// ───────────────────────────────────────────────────────────────

/// The card service orchestrates all domain logic.
pub struct CardService {
    loader: RecordLoader,
    session: SessionMachine,
    config: SystemConfig,
    /// Identity of the card application this engine serves; refreshes
    /// scoped to a different application are ignored.
    aid: AppId,
    /// Outstanding subscription query, while one exists.
    subscription_req: Option<CorrelationId>,
    subscription: Option<SubscriptionInfo>,
    /// MCC+MNC derived from the IMSI at the last all-loaded, published
    /// through the property sink and kept for direct queries.
    operator_numeric: Option<heapless::String<8>>,
}

impl CardService {
    /// Construct the service from configuration.
    ///
    /// Does **not** issue anything — the load starts when
    /// [`Event::AppReady`] arrives.
    pub fn new(config: SystemConfig, aid: &str) -> Result<Self, Error> {
        config.validate().map_err(Error::Config)?;
        let mut app_id = AppId::new();
        // Char-wise so an oversized identity truncates on a boundary.
        for ch in aid.chars() {
            if app_id.push(ch).is_err() {
                break;
            }
        }
        Ok(Self {
            loader: RecordLoader::new(&config),
            session: SessionMachine::new(&config),
            config,
            aid: app_id,
            subscription_req: None,
            subscription: None,
            operator_numeric: None,
        })
    }

    // ── Event dispatch ────────────────────────────────────────

    /// Process one event from the queue.  This is the only entry point
    /// that mutates engine state; callers must invoke it from a single
    /// logical thread.
    pub fn handle_event(
        &mut self,
        event: Event,
        transport: &mut impl TransportPort,
        host: &mut (impl EventSink + PropertySink),
        locale: &impl LocaleResolver,
    ) {
        trace!("dispatch {}", event.name());
        match event {
            Event::AppReady => self.start_load(transport, host),
            Event::TransportResult { id, outcome } => {
                self.route_result(id, &outcome, host, locale);
            }
            Event::Refresh(refresh) => self.handle_refresh(refresh, transport, host),
            Event::RetryWindowElapsed => {
                let outcome = self.session.retry_now(transport);
                self.emit_session(outcome, host);
            }
        }
    }

    /// Process an external command (from the host API surface).
    pub fn handle_command(
        &mut self,
        command: AppCommand,
        transport: &mut impl TransportPort,
        sink: &mut impl EventSink,
    ) {
        match command {
            AppCommand::Connect(params) => {
                let outcome = self.session.connect(params, transport);
                self.emit_session(outcome, sink);
            }
            AppCommand::Disconnect => {
                let outcome = self.session.disconnect(transport);
                self.emit_session(outcome, sink);
            }
            AppCommand::Reload => {
                self.loader.reset();
                self.start_load(transport, sink);
            }
            AppCommand::HardReset => {
                let outcome = self.session.hard_reset(transport);
                self.emit_session(outcome, sink);
                sink.emit(&AppEvent::RadioPoweredDown);
            }
            AppCommand::UpdateConfig(new_config) => {
                if let Err(reason) = new_config.validate() {
                    warn!("config update rejected: {reason}");
                    return;
                }
                self.loader.reconfigure(&new_config);
                self.session.reconfigure(&new_config);
                self.config = new_config;
                info!("configuration updated at runtime");
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// The aggregated record set, once fully loaded.
    pub fn records(&self) -> Option<&RecordSet> {
        self.loader.fields()
    }

    /// Single-field lookup.  `None` until all-loaded, and for fields the
    /// card did not carry.
    pub fn field(&self, field: Field) -> Option<FieldValue> {
        self.loader.fields().and_then(|set| set.get(field))
    }

    /// MCC+MNC string derived from the IMSI, once records are loaded.
    pub fn operator_numeric(&self) -> Option<&str> {
        self.operator_numeric.as_deref()
    }

    /// Generation stamp of the current (or most recent) load batch.
    pub fn record_generation(&self) -> u32 {
        self.loader.generation()
    }

    /// The CDMA subscription tuple, once answered.
    pub fn subscription(&self) -> Option<&SubscriptionInfo> {
        self.subscription.as_ref()
    }

    /// Whether the card carries a usable subscription: MDN and MIN both
    /// present, or the lab-card override is set.
    pub fn is_provisioned(&self) -> bool {
        if self.config.test_card_override {
            return true;
        }
        self.loader
            .fields()
            .is_some_and(|set| set.mdn.is_some() && set.min.is_some())
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.config.clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn start_load(&mut self, transport: &mut impl TransportPort, sink: &mut impl EventSink) {
        self.loader.begin_load(transport);
        // Queried alongside the batch but deliberately outside its count.
        self.subscription_req = Some(transport.send(Command::ReadSubscription));
        self.subscription = None;
        sink.emit(&AppEvent::RecordLoadStarted {
            generation: self.loader.generation(),
        });
    }

    fn route_result(
        &mut self,
        id: CorrelationId,
        outcome: &Outcome,
        host: &mut (impl EventSink + PropertySink),
        locale: &impl LocaleResolver,
    ) {
        if self.subscription_req == Some(id) {
            self.subscription_req = None;
            self.on_subscription(outcome);
            return;
        }
        if self.session.owns(id) {
            let session_outcome = self.session.on_result(id, outcome);
            self.emit_session(session_outcome, host);
            return;
        }
        if self.loader.on_result(id, outcome) == crate::records::LoadProgress::Completed {
            self.on_all_loaded(host, locale);
        }
    }

    fn on_subscription(&mut self, outcome: &Outcome) {
        match outcome {
            Ok(Response::Subscription {
                mdn,
                min,
                prl_version,
            }) => {
                // Last four characters only; char_indices keeps the cut
                // on a boundary whatever the payload carries.
                let d = mdn.as_str();
                let start = d.char_indices().rev().nth(3).map_or(0, |(i, _)| i);
                let tail = &d[start..];
                debug!("subscription answered: mdn xxx{tail}");
                self.subscription = Some(SubscriptionInfo {
                    mdn: mdn.clone(),
                    min: min.clone(),
                    prl_version: prl_version.clone(),
                });
            }
            Ok(other) => warn!("unexpected subscription payload {other:?}"),
            Err(e) => warn!("subscription query failed: {e}"),
        }
    }

    fn handle_refresh(
        &mut self,
        refresh: RefreshEvent,
        transport: &mut impl TransportPort,
        sink: &mut impl EventSink,
    ) {
        if !refresh.applies_to(self.aid.as_str()) {
            trace!("refresh for another application, ignoring");
            return;
        }
        match refresh.kind {
            RefreshKind::FileUpdate | RefreshKind::Init => {
                info!("card refresh ({:?}): reloading records", refresh.kind);
                self.loader.reset();
                self.start_load(transport, sink);
            }
            RefreshKind::Reset => {
                // The card is going away; cached records are meaningless
                // and the radio must not keep using them.  No automatic
                // reload: the host drives recovery after the card returns.
                info!("card reset announced: powering down");
                self.loader.reset();
                let outcome = self.session.hard_reset(transport);
                self.emit_session(outcome, sink);
                sink.emit(&AppEvent::RadioPoweredDown);
            }
        }
    }

    fn on_all_loaded(
        &mut self,
        host: &mut (impl EventSink + PropertySink),
        locale: &impl LocaleResolver,
    ) {
        self.publish_properties(host, locale);
        host.emit(&AppEvent::AllRecordsLoaded {
            provisioned: self.is_provisioned(),
        });
    }

    /// Derive and publish identity values from the loaded record set.
    fn publish_properties(
        &mut self,
        props: &mut impl PropertySink,
        locale: &impl LocaleResolver,
    ) {
        let Some(set) = self.loader.fields() else {
            return;
        };

        let mut country = "";
        if let Some(imsi) = set.imsi.as_deref() {
            if let Some(mcc) = imsi.get(..3).and_then(|m| m.parse::<u16>().ok()) {
                // Operator numeric is MCC plus the country's shortest MNC.
                let digits = 3 + locale.mnc_length(mcc) as usize;
                if let Some(numeric) = imsi.get(..digits) {
                    let mut cached = heapless::String::new();
                    let _ = cached.push_str(numeric);
                    self.operator_numeric = Some(cached);
                    props.set_operator_numeric(numeric);
                }
                if let Some(iso) = locale.country_for_mcc(mcc) {
                    country = iso;
                    props.set_iso_country(iso);
                }
            }
        }

        if let Some(language) = best_language(set, locale) {
            props.set_locale(language, country);
        }

        if set.spn_display_condition {
            if let Some(name) = set.service_name.as_deref() {
                props.set_service_name(name);
            }
        }
    }

    fn emit_session(&self, outcome: SessionOutcome, sink: &mut impl EventSink) {
        match outcome {
            SessionOutcome::Unchanged => {}
            SessionOutcome::Transition { from, to } => {
                sink.emit(&AppEvent::SessionStateChanged { from, to });
            }
            SessionOutcome::FailedAttempt {
                from,
                cause,
                decision,
            } => {
                sink.emit(&AppEvent::SessionStateChanged {
                    from,
                    to: SessionState::Failed,
                });
                sink.emit(&AppEvent::SessionFailed(cause));
                if let RetryDecision::Retry { delay_ms } = decision {
                    sink.emit(&AppEvent::RetryPending { delay_ms });
                }
            }
        }
    }
}

/// First language from the card's preference lists (CSIM list first,
/// ISO list as fallback) that the host can render.
fn best_language<'a>(set: &'a RecordSet, locale: &impl LocaleResolver) -> Option<&'a str> {
    set.csim_languages
        .iter()
        .chain(set.iso_languages.iter())
        .filter_map(|code| core::str::from_utf8(code).ok())
        .find(|lang| locale.supports_language(lang))
}
