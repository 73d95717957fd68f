//! Session lifecycle integration tests through the full service dispatch.

use cardlink::app::commands::AppCommand;
use cardlink::app::events::AppEvent;
use cardlink::app::service::CardService;
use cardlink::config::SystemConfig;
use cardlink::error::{FailCause, TransportError};
use cardlink::events::Event;
use cardlink::session::{ConnectParams, SessionState};
use cardlink::transport::{Command, RejectReason, Response};

use crate::mock_modem::{setup_done, MockModem, Recorder, TestLocale};

fn service() -> CardService {
    CardService::new(SystemConfig::default(), "A0000003431002").unwrap()
}

fn params() -> ConnectParams {
    let mut p = ConnectParams::new("internet.example");
    p.user.push_str("user").unwrap();
    p.password.push_str("secret").unwrap();
    p
}

fn result(svc: &mut CardService, modem: &mut MockModem, rec: &mut Recorder, id: cardlink::transport::CorrelationId, outcome: cardlink::transport::Outcome) {
    svc.handle_event(
        Event::TransportResult { id, outcome },
        modem,
        rec,
        &TestLocale,
    );
}

#[test]
fn connect_success_emits_transitions() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);
    assert_eq!(svc.session_state(), SessionState::Connecting);

    let id = modem.last_id();
    result(&mut svc, &mut modem, &mut rec, id, setup_done(3, &["8.8.8.8"]));

    assert_eq!(svc.session_state(), SessionState::Active);
    assert!(rec.events.contains(&AppEvent::SessionStateChanged {
        from: SessionState::Connecting,
        to: SessionState::Active,
    }));
}

#[test]
fn auth_rejection_then_stale_success_stays_failed() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);
    let id = modem.last_id();

    result(
        &mut svc,
        &mut modem,
        &mut rec,
        id,
        Ok(Response::SetupRejected(RejectReason::AuthFailed)),
    );
    assert_eq!(svc.session_state(), SessionState::Failed);
    assert!(rec
        .events
        .contains(&AppEvent::SessionFailed(FailCause::AuthenticationRejected)));
    // Permanent cause: no retry scheduled.
    assert_eq!(rec.count(|e| matches!(e, AppEvent::RetryPending { .. })), 0);

    // A late duplicate success for the same attempt must be discarded.
    result(&mut svc, &mut modem, &mut rec, id, setup_done(3, &["8.8.8.8"]));
    assert_eq!(svc.session_state(), SessionState::Failed);
}

#[test]
fn timeout_retries_with_backoff_then_connects() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);
    let first = modem.last_id();
    result(&mut svc, &mut modem, &mut rec, first, Err(TransportError::Timeout));

    assert_eq!(svc.session_state(), SessionState::Failed);
    assert!(rec
        .events
        .contains(&AppEvent::RetryPending { delay_ms: 5_000 }));

    // Host timer fires; a fresh attempt with a fresh ticket goes out.
    svc.handle_event(Event::RetryWindowElapsed, &mut modem, &mut rec, &TestLocale);
    let second = modem.last_id();
    assert_ne!(first, second);
    assert_eq!(svc.session_state(), SessionState::Connecting);

    result(&mut svc, &mut modem, &mut rec, second, setup_done(1, &["8.8.8.8"]));
    assert_eq!(svc.session_state(), SessionState::Active);
}

#[test]
fn retry_budget_exhausts() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);
    for _ in 0..4 {
        let id = modem.last_id();
        result(&mut svc, &mut modem, &mut rec, id, Err(TransportError::Unavailable));
        svc.handle_event(Event::RetryWindowElapsed, &mut modem, &mut rec, &TestLocale);
    }

    // Three automatic re-attempts, then the machine stays failed.
    assert_eq!(svc.session_state(), SessionState::Failed);
    assert_eq!(rec.count(|e| matches!(e, AppEvent::RetryPending { .. })), 3);
    assert_eq!(
        modem.count_of(|c| matches!(c, Command::SetupSession(_))),
        4
    );
}

#[test]
fn null_dns_setup_fails_with_protocol_mismatch() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);
    let id = modem.last_id();
    result(&mut svc, &mut modem, &mut rec, id, setup_done(1, &["0.0.0.0", "::"]));

    assert_eq!(svc.session_state(), SessionState::Failed);
    assert!(rec
        .events
        .contains(&AppEvent::SessionFailed(FailCause::ProtocolMismatch)));
}

#[test]
fn disconnect_roundtrip() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);
    let id = modem.last_id();
    result(&mut svc, &mut modem, &mut rec, id, setup_done(7, &["8.8.8.8"]));

    svc.handle_command(AppCommand::Disconnect, &mut modem, &mut rec);
    assert_eq!(svc.session_state(), SessionState::Disconnecting);
    assert!(modem
        .id_of(|c| matches!(c, Command::TeardownSession { cid: 7 }))
        .is_some());

    let id = modem.last_id();
    result(&mut svc, &mut modem, &mut rec, id, Ok(Response::TeardownDone));
    assert_eq!(svc.session_state(), SessionState::Idle);
}

#[test]
fn connect_while_connecting_issues_nothing() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);
    svc.handle_command(AppCommand::Connect(params()), &mut modem, &mut rec);

    assert_eq!(modem.count_of(|c| matches!(c, Command::SetupSession(_))), 1);
}
