//! Packet-data session state machine.
//!
//! Drives one connection lifecycle over the transport channel:
//!
//! ```text
//!          connect(params)              setup ok
//!   Idle ──────────────────▶ Connecting ─────────▶ Active
//!    ▲                           │                    │
//!    │        teardown done      │ setup failed       │ disconnect()
//!    └──────── Disconnecting ◀───┼────────────────────┘
//!    ▲                           ▼
//!    └── hard reset ──────── Failed ── retry policy ──▶ Connecting
//! ```
//!
//! Exactly one setup or teardown command is outstanding per attempt; a
//! completion whose correlation id does not match the current attempt is
//! ignored, never applied to a newer one.  A failed attempt records its
//! cause once and the attempt object is replaced — not mutated — on the
//! next try.

pub mod retry;

use log::{debug, info, warn};

use crate::app::ports::TransportPort;
use crate::config::SystemConfig;
use crate::error::FailCause;
use crate::transport::{
    Command, CorrelationId, Outcome, RejectReason, Response, SessionInfo, SetupRequest,
};

use retry::{RetryDecision, RetryPolicy};

// ───────────────────────────────────────────────────────────────
// States
// ───────────────────────────────────────────────────────────────

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Disconnecting,
    Failed,
}

impl SessionState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Active => "ACTIVE",
            Self::Disconnecting => "DISCONNECTING",
            Self::Failed => "FAILED",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Connection parameters
// ───────────────────────────────────────────────────────────────

/// Authentication preference.  `Unspecified` resolves at setup time:
/// no username means no auth, otherwise PAP/CHAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPreference {
    #[default]
    Unspecified,
    NoAuth,
    Pap,
    Chap,
    PapChap,
}

/// Session layer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Ipv4,
    Ipv6,
    Ipv4v6,
}

impl Protocol {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ipv4 => "IP",
            Self::Ipv6 => "IPV6",
            Self::Ipv4v6 => "IPV4V6",
        }
    }
}

/// Everything needed to establish one session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectParams {
    /// Data profile id; engine default when `None`.
    pub profile_id: Option<u8>,
    pub apn: heapless::String<32>,
    pub user: heapless::String<32>,
    pub password: heapless::String<32>,
    pub auth: AuthPreference,
    pub protocol: Protocol,
    pub roaming_protocol: Protocol,
    /// Whether the device currently roams (selects `roaming_protocol`).
    pub roaming: bool,
}

impl ConnectParams {
    pub fn new(apn: &str) -> Self {
        let mut params = Self::default();
        // Truncate on a char boundary; a byte-index slice could split a
        // multi-byte character and panic.
        for ch in apn.chars() {
            if params.apn.push(ch).is_err() {
                break;
            }
        }
        params
    }
}

/// One session-establishment attempt.  Replaced, never mutated, on each
/// new try; its failure cause is terminal.
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    pub params: ConnectParams,
    /// Monotonic creation stamp (event-sequence domain, not wall clock).
    pub created_seq: u64,
    /// Generation tag used to discard stale completions.
    pub generation: u32,
    /// The single outstanding setup command, while one exists.
    outstanding: Option<CorrelationId>,
    fail_cause: FailCause,
}

impl ConnectionAttempt {
    pub fn fail_cause(&self) -> FailCause {
        self.fail_cause
    }
}

// ───────────────────────────────────────────────────────────────
// Machine
// ───────────────────────────────────────────────────────────────

/// What one input did to the machine; the service layer turns these into
/// outbound notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Nothing observable happened (stale/ignored input, no-op call).
    Unchanged,
    /// Plain state transition.
    Transition { from: SessionState, to: SessionState },
    /// Attempt failed; carries the terminal cause and the retry decision.
    FailedAttempt {
        from: SessionState,
        cause: FailCause,
        decision: RetryDecision,
    },
}

/// The session state machine.
pub struct SessionMachine {
    state: SessionState,
    attempt: Option<ConnectionAttempt>,
    info: Option<SessionInfo>,
    retry: RetryPolicy,
    /// Outstanding teardown command, while one exists.
    teardown: Option<CorrelationId>,
    /// Outstanding radio power command, while one exists.  Tracked so its
    /// completion routes here whatever the outcome payload is.
    power: Option<CorrelationId>,
    /// Set when the policy granted a retry; a timer event with this clear
    /// (spurious, or after give-up) must not reconnect.
    retry_armed: bool,
    generation: u32,
    seq: u64,
    default_profile_id: u8,
}

impl SessionMachine {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            state: SessionState::Idle,
            attempt: None,
            info: None,
            retry: RetryPolicy::new(config),
            teardown: None,
            power: None,
            retry_armed: false,
            generation: 0,
            seq: 0,
            default_profile_id: config.default_profile_id,
        }
    }

    /// Apply a hot-reloaded configuration.  Affects future attempts only.
    pub fn reconfigure(&mut self, config: &SystemConfig) {
        self.retry = RetryPolicy::new(config);
        self.default_profile_id = config.default_profile_id;
    }

    // ── External API ──────────────────────────────────────────

    /// Begin establishing a session.  Valid from `Idle` and `Failed`;
    /// rejected (logged, no state change) anywhere else.
    pub fn connect(
        &mut self,
        params: ConnectParams,
        transport: &mut dyn TransportPort,
    ) -> SessionOutcome {
        match self.state {
            SessionState::Idle | SessionState::Failed => {
                self.retry.reset();
                self.start_attempt(params, transport)
            }
            other => {
                warn!("connect() ignored in state {}", other.name());
                SessionOutcome::Unchanged
            }
        }
    }

    /// Re-drive the last failed attempt (retry window elapsed).
    pub fn retry_now(&mut self, transport: &mut dyn TransportPort) -> SessionOutcome {
        if self.state != SessionState::Failed || !self.retry_armed {
            debug!("retry window elapsed in state {}, ignoring", self.state.name());
            return SessionOutcome::Unchanged;
        }
        match self.attempt.as_ref().map(|a| a.params.clone()) {
            Some(params) => self.start_attempt(params, transport),
            None => SessionOutcome::Unchanged,
        }
    }

    /// Tear the active session down.
    pub fn disconnect(&mut self, transport: &mut dyn TransportPort) -> SessionOutcome {
        if self.state != SessionState::Active {
            warn!("disconnect() ignored in state {}", self.state.name());
            return SessionOutcome::Unchanged;
        }
        let cid = self.info.as_ref().map_or(0, |i| i.cid);
        self.teardown = Some(transport.send(Command::TeardownSession { cid }));
        self.transition(SessionState::Disconnecting)
    }

    /// Hard reset: power the radio down and drop to `Idle`.  Deliberately
    /// no automatic reconnect — the host decides when to power back on.
    pub fn hard_reset(&mut self, transport: &mut dyn TransportPort) -> SessionOutcome {
        self.power = Some(transport.send(Command::RadioPower { on: false }));
        info!("hard reset: radio powered down");
        self.attempt = None;
        self.info = None;
        self.teardown = None;
        self.retry_armed = false;
        self.retry.reset();
        if self.state == SessionState::Idle {
            SessionOutcome::Unchanged
        } else {
            self.transition(SessionState::Idle)
        }
    }

    /// Whether this machine issued the command with the given id and the
    /// completion should be routed here.
    pub fn owns(&self, id: CorrelationId) -> bool {
        self.attempt
            .as_ref()
            .is_some_and(|a| a.outstanding == Some(id))
            || self.teardown == Some(id)
            || self.power == Some(id)
    }

    /// Feed one transport completion.
    pub fn on_result(&mut self, id: CorrelationId, outcome: &Outcome) -> SessionOutcome {
        if self.teardown == Some(id) {
            return self.on_teardown_result(outcome);
        }
        if self.power == Some(id) {
            self.power = None;
            match outcome {
                Ok(_) => debug!("radio power command {id} completed"),
                // Nothing to recover: the machine already dropped to Idle.
                Err(e) => warn!("radio power command {id} failed: {e}"),
            }
            return SessionOutcome::Unchanged;
        }
        let current = self
            .attempt
            .as_ref()
            .and_then(|a| a.outstanding)
            .filter(|o| *o == id);
        if current.is_none() {
            // Stale completion for a superseded attempt: consumed, never
            // applied to the newer attempt.
            debug!("stale session completion {id}, discarding");
            return SessionOutcome::Unchanged;
        }
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.outstanding = None;
        }
        self.on_setup_result(outcome)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Terminal failure cause of the current attempt.
    pub fn fail_cause(&self) -> FailCause {
        self.attempt.as_ref().map_or(FailCause::None, |a| a.fail_cause)
    }

    /// Addressing of the active session.
    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    pub fn attempt(&self) -> Option<&ConnectionAttempt> {
        self.attempt.as_ref()
    }

    // ── Internal ──────────────────────────────────────────────

    fn start_attempt(
        &mut self,
        params: ConnectParams,
        transport: &mut dyn TransportPort,
    ) -> SessionOutcome {
        self.seq += 1;
        self.generation = self.generation.wrapping_add(1);
        self.info = None;
        self.retry_armed = false;

        let request = self.build_setup_request(&params);
        info!(
            "connecting: APN '{}' protocol {} auth {}",
            request.apn, request.protocol, request.auth_code
        );
        let id = transport.send(Command::SetupSession(request));

        // Replace, don't mutate: the previous attempt (and its terminal
        // cause) is gone, its stale completions no longer match.
        self.attempt = Some(ConnectionAttempt {
            params,
            created_seq: self.seq,
            generation: self.generation,
            outstanding: Some(id),
            fail_cause: FailCause::None,
        });
        self.transition(SessionState::Connecting)
    }

    fn build_setup_request(&self, params: &ConnectParams) -> SetupRequest {
        let auth_code = match params.auth {
            AuthPreference::Unspecified => {
                if params.user.is_empty() {
                    0
                } else {
                    3
                }
            }
            AuthPreference::NoAuth => 0,
            AuthPreference::Pap => 1,
            AuthPreference::Chap => 2,
            AuthPreference::PapChap => 3,
        };
        let protocol = if params.roaming {
            params.roaming_protocol
        } else {
            params.protocol
        };
        let mut proto_str: heapless::String<8> = heapless::String::new();
        let _ = proto_str.push_str(protocol.as_str());

        SetupRequest {
            profile_id: params.profile_id.unwrap_or(self.default_profile_id),
            apn: params.apn.clone(),
            user: params.user.clone(),
            password: params.password.clone(),
            auth_code,
            protocol: proto_str,
        }
    }

    fn on_setup_result(&mut self, outcome: &Outcome) -> SessionOutcome {
        if self.state != SessionState::Connecting {
            debug!("setup completion in state {}, ignoring", self.state.name());
            return SessionOutcome::Unchanged;
        }
        match outcome {
            Ok(Response::SetupDone(info)) => {
                if dns_unusable(info) {
                    // The network accepted but returned no resolvers; the
                    // session would be useless.  Treat as a failed attempt
                    // so the retry policy re-drives it.
                    warn!("setup accepted but DNS list unusable");
                    return self.fail_attempt(FailCause::ProtocolMismatch);
                }
                info!("session active: cid {} address {}", info.cid, info.address);
                self.info = Some(info.clone());
                self.retry.reset();
                self.transition(SessionState::Active)
            }
            Ok(Response::SetupRejected(reason)) => self.fail_attempt(match reason {
                RejectReason::AuthFailed => FailCause::AuthenticationRejected,
                RejectReason::NetworkFailure => FailCause::NetworkRejected,
                RejectReason::ProtocolUnsupported => FailCause::ProtocolMismatch,
            }),
            Ok(other) => {
                warn!("unexpected setup payload {other:?}");
                self.fail_attempt(FailCause::ProtocolMismatch)
            }
            Err(e) => self.fail_attempt(FailCause::from(*e)),
        }
    }

    fn on_teardown_result(&mut self, outcome: &Outcome) -> SessionOutcome {
        self.teardown = None;
        if let Err(e) = outcome {
            // The link is gone either way; report idle.
            warn!("teardown completed with error: {e}");
        }
        self.info = None;
        self.attempt = None;
        if self.state == SessionState::Disconnecting {
            self.transition(SessionState::Idle)
        } else {
            SessionOutcome::Unchanged
        }
    }

    fn fail_attempt(&mut self, cause: FailCause) -> SessionOutcome {
        let from = self.state;
        if let Some(attempt) = self.attempt.as_mut() {
            // Terminal: set at most once per attempt.
            if attempt.fail_cause == FailCause::None {
                attempt.fail_cause = cause;
            }
        }
        self.state = SessionState::Failed;
        info!("session failed: {cause}");
        let decision = self.retry.next(cause);
        self.retry_armed = matches!(decision, RetryDecision::Retry { .. });
        SessionOutcome::FailedAttempt {
            from,
            cause,
            decision,
        }
    }

    fn transition(&mut self, to: SessionState) -> SessionOutcome {
        let from = self.state;
        info!("session transition: {} -> {}", from.name(), to.name());
        self.state = to;
        SessionOutcome::Transition { from, to }
    }
}

/// True when every returned DNS entry is a null address.
fn dns_unusable(info: &SessionInfo) -> bool {
    !info.dns.is_empty()
        && info
            .dns
            .iter()
            .all(|d| d.as_str() == "0.0.0.0" || d.as_str() == "::")
}
