//! Record-load integration tests: full batches through the service,
//! with mixed outcomes, duplicates and out-of-order delivery.

use cardlink::app::events::AppEvent;
use cardlink::app::service::CardService;
use cardlink::config::SystemConfig;
use cardlink::error::TransportError;
use cardlink::events::Event;
use cardlink::transport::{Command, FileKind};

use crate::mock_modem::{answer_batch, data_of, imsi_ok, MockModem, Recorder, TestLocale};

const AID: &str = "A0000003431002";

fn service() -> CardService {
    CardService::new(SystemConfig::default(), AID).unwrap()
}

fn deliver(
    svc: &mut CardService,
    modem: &mut MockModem,
    rec: &mut Recorder,
    completions: Vec<(cardlink::transport::CorrelationId, cardlink::transport::Outcome)>,
) {
    for (id, outcome) in completions {
        svc.handle_event(
            Event::TransportResult { id, outcome },
            modem,
            rec,
            &TestLocale,
        );
    }
}

#[test]
fn mixed_batch_completes_with_failures_tolerated() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_event(Event::AppReady, &mut modem, &mut rec, &TestLocale);
    // 9 file/IMSI requests plus the subscription query.
    assert_eq!(modem.sent.len(), 10);

    let completions = answer_batch(&modem, 0, TransportError::Timeout);
    deliver(&mut svc, &mut modem, &mut rec, completions);

    // One completion event, fields reflect the mix.
    assert_eq!(
        rec.count(|e| matches!(e, AppEvent::AllRecordsLoaded { .. })),
        1
    );
    let set = svc.records().expect("load finished");
    assert_eq!(set.imsi.as_deref(), Some("310004123456789"));
    assert_eq!(set.prl_version, Some(300));
    assert!(set.iccid.is_none());
    assert!(set.service_name.is_none());

    // Subscription answered outside the batch.
    assert_eq!(svc.subscription().unwrap().mdn.as_str(), "5551234567");
}

#[test]
fn properties_published_once_loaded() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_event(Event::AppReady, &mut modem, &mut rec, &TestLocale);
    let mut completions = answer_batch(&modem, 0, TransportError::Timeout);
    // Answer the CSIM language file too: Japanese then English.
    let li_id = modem
        .id_of(|c| {
            matches!(
                c,
                Command::ReadTransparent {
                    file: FileKind::CsimLanguage,
                    ..
                }
            )
        })
        .unwrap();
    for entry in &mut completions {
        if entry.0 == li_id {
            entry.1 = data_of(&[0x00, 0x04, 0x00, 0x01]);
        }
    }
    deliver(&mut svc, &mut modem, &mut rec, completions);

    // MCC 310 resolves to a 3-digit MNC and the US.
    assert_eq!(rec.numeric.as_deref(), Some("310004"));
    assert_eq!(rec.country.as_deref(), Some("us"));
    // First supported language from the CSIM list wins.
    assert_eq!(
        rec.locale,
        Some(("ja".to_string(), "us".to_string()))
    );
}

#[test]
fn out_of_order_and_duplicate_delivery_fires_once() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_event(Event::AppReady, &mut modem, &mut rec, &TestLocale);
    let mut completions = answer_batch(&modem, 0, TransportError::Unavailable);
    completions.reverse();
    // Duplicate every completion.
    let doubled: Vec<_> = completions
        .iter()
        .cloned()
        .chain(completions.iter().cloned())
        .collect();
    deliver(&mut svc, &mut modem, &mut rec, doubled);

    assert_eq!(
        rec.count(|e| matches!(e, AppEvent::AllRecordsLoaded { .. })),
        1
    );
    assert!(svc.records().is_some());
}

#[test]
fn reload_mid_batch_discards_first_generation() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_event(Event::AppReady, &mut modem, &mut rec, &TestLocale);
    let first_batch = answer_batch(&modem, 0, TransportError::Timeout);
    let first_imsi = modem.id_of(|c| matches!(c, Command::ReadImsi)).unwrap();

    // A reload supersedes the batch before anything answers.
    svc.handle_command(
        cardlink::app::commands::AppCommand::Reload,
        &mut modem,
        &mut rec,
    );
    assert_eq!(modem.sent.len(), 20);

    // Every old completion is consumed silently.
    deliver(&mut svc, &mut modem, &mut rec, first_batch);
    assert!(svc.records().is_none());
    assert_eq!(
        rec.count(|e| matches!(e, AppEvent::AllRecordsLoaded { .. })),
        0
    );

    // A stale IMSI success never leaks into the new set: complete the new
    // batch with all failures and check the field is absent.
    svc.handle_event(
        Event::TransportResult {
            id: first_imsi,
            outcome: imsi_ok("310004123456789"),
        },
        &mut modem,
        &mut rec,
        &TestLocale,
    );
    let second_batch = answer_batch(&modem, 10, TransportError::Timeout)
        .into_iter()
        .map(|(id, _)| (id, Err(TransportError::Timeout)))
        .collect();
    deliver(&mut svc, &mut modem, &mut rec, second_batch);

    let set = svc.records().expect("second batch finished");
    assert!(set.imsi.is_none());
}

#[test]
fn provisioning_requires_mdn_and_min() {
    let mut modem = MockModem::new();
    let mut rec = Recorder::new();
    let mut svc = service();

    svc.handle_event(Event::AppReady, &mut modem, &mut rec, &TestLocale);
    // MDN record answers, IMSI_M (MIN source) does not.
    let completions: Vec<_> = answer_batch(&modem, 0, TransportError::Timeout)
        .into_iter()
        .map(|(id, outcome)| {
            let cmd = &modem.sent.iter().find(|(i, _)| *i == id).unwrap().1;
            if matches!(
                cmd,
                Command::ReadRecord {
                    file: FileKind::CsimMdn,
                    ..
                }
            ) {
                (id, data_of(&[0x0A, 0x55, 0x15, 0x32, 0x54, 0x76]))
            } else {
                (id, outcome)
            }
        })
        .collect();
    deliver(&mut svc, &mut modem, &mut rec, completions);

    assert!(svc.records().is_some());
    assert!(!svc.is_provisioned());
    assert!(rec
        .events
        .contains(&AppEvent::AllRecordsLoaded { provisioned: false }));
}
