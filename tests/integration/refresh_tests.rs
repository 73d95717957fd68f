//! Refresh and reset handling through the full service dispatch.

use cardlink::app::commands::AppCommand;
use cardlink::app::events::AppEvent;
use cardlink::app::service::CardService;
use cardlink::config::SystemConfig;
use cardlink::error::TransportError;
use cardlink::events::Event;
use cardlink::refresh::{RefreshEvent, RefreshKind};
use cardlink::session::{ConnectParams, SessionState};
use cardlink::transport::Command;

use crate::mock_modem::{answer_batch, setup_done, MockModem, Recorder, TestLocale};

const AID: &str = "A0000003431002";

fn loaded_service(modem: &mut MockModem, rec: &mut Recorder) -> CardService {
    let mut svc = CardService::new(SystemConfig::default(), AID).unwrap();
    svc.handle_event(Event::AppReady, modem, rec, &TestLocale);
    for (id, outcome) in answer_batch(modem, 0, TransportError::Timeout) {
        svc.handle_event(Event::TransportResult { id, outcome }, modem, rec, &TestLocale);
    }
    assert!(svc.records().is_some());
    svc
}

fn connect_active(svc: &mut CardService, modem: &mut MockModem, rec: &mut Recorder) {
    svc.handle_command(
        AppCommand::Connect(ConnectParams::new("internet.example")),
        modem,
        rec,
    );
    let id = modem.last_id();
    svc.handle_event(
        Event::TransportResult {
            id,
            outcome: setup_done(2, &["8.8.8.8"]),
        },
        modem,
        rec,
        &TestLocale,
    );
    assert_eq!(svc.session_state(), SessionState::Active);
}

#[test]
fn hard_reset_while_active_powers_down_without_reload() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = loaded_service(&mut modem, &mut rec);
    connect_active(&mut svc, &mut modem, &mut rec);

    let issued = modem.sent.len();
    svc.handle_command(AppCommand::HardReset, &mut modem, &mut rec);

    assert_eq!(svc.session_state(), SessionState::Idle);
    assert!(rec.events.contains(&AppEvent::RadioPoweredDown));
    assert!(modem
        .id_of(|c| matches!(c, Command::RadioPower { on: false }))
        .is_some());
    // Exactly the power command, nothing else: no teardown, no reload.
    assert_eq!(modem.sent.len(), issued + 1);
    assert_eq!(
        rec.count(|e| matches!(e, AppEvent::RecordLoadStarted { .. })),
        1
    );
}

#[test]
fn file_update_refresh_reloads_while_session_stays_up() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = loaded_service(&mut modem, &mut rec);
    connect_active(&mut svc, &mut modem, &mut rec);

    let before = modem.sent.len();
    svc.handle_event(
        Event::Refresh(RefreshEvent::for_app(RefreshKind::FileUpdate, AID)),
        &mut modem,
        &mut rec,
        &TestLocale,
    );

    // Records withdrawn until the new batch completes; session untouched.
    assert!(svc.records().is_none());
    assert_eq!(svc.session_state(), SessionState::Active);

    for (id, outcome) in answer_batch(&modem, before, TransportError::Timeout) {
        svc.handle_event(
            Event::TransportResult { id, outcome },
            &mut modem,
            &mut rec,
            &TestLocale,
        );
    }
    assert!(svc.records().is_some());
    assert_eq!(
        rec.count(|e| matches!(e, AppEvent::AllRecordsLoaded { .. })),
        2
    );
}

#[test]
fn init_refresh_reloads_records() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = loaded_service(&mut modem, &mut rec);

    svc.handle_event(
        Event::Refresh(RefreshEvent::new(RefreshKind::Init)),
        &mut modem,
        &mut rec,
        &TestLocale,
    );
    assert!(svc.records().is_none());
    assert!(rec
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::RecordLoadStarted { generation: 2 })));
}

#[test]
fn refresh_scoped_to_another_application_is_ignored() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = loaded_service(&mut modem, &mut rec);
    let issued = modem.sent.len();

    svc.handle_event(
        Event::Refresh(RefreshEvent::for_app(RefreshKind::Reset, "A0000000871004")),
        &mut modem,
        &mut rec,
        &TestLocale,
    );

    assert_eq!(modem.sent.len(), issued);
    assert!(svc.records().is_some());
    assert!(!rec.events.contains(&AppEvent::RadioPoweredDown));
}

#[test]
fn reset_refresh_drops_session_and_records() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = loaded_service(&mut modem, &mut rec);
    connect_active(&mut svc, &mut modem, &mut rec);

    svc.handle_event(
        Event::Refresh(RefreshEvent::for_app(RefreshKind::Reset, AID)),
        &mut modem,
        &mut rec,
        &TestLocale,
    );

    assert_eq!(svc.session_state(), SessionState::Idle);
    assert!(svc.records().is_none());
    assert!(rec.events.contains(&AppEvent::RadioPoweredDown));
    // No automatic reload after a card reset.
    assert_eq!(
        rec.count(|e| matches!(e, AppEvent::RecordLoadStarted { .. })),
        1
    );
}
