//! Fuzz target: load/session dispatch bookkeeping.
//!
//! Interprets the input as a stream of completion deliveries (arbitrary
//! correlation ids, arbitrary outcomes, interleaved reloads) and asserts
//! the counter invariants: pending never wraps, completion latches once,
//! stale ids never touch newer generations.
//!
//! cargo fuzz run fuzz_load_dispatch

#![no_main]

use cardlink::app::ports::TransportPort;
use cardlink::config::SystemConfig;
use cardlink::error::TransportError;
use cardlink::records::{LoadProgress, RecordLoader};
use cardlink::transport::{Command, CorrelationId, Outcome, Response};
use libfuzzer_sys::fuzz_target;

struct NullTransport {
    next_id: u32,
}

impl TransportPort for NullTransport {
    fn send(&mut self, _command: Command) -> CorrelationId {
        self.next_id += 1;
        CorrelationId(self.next_id)
    }
}

fn outcome_for(byte: u8) -> Outcome {
    match byte % 4 {
        0 => Err(TransportError::Timeout),
        1 => Err(TransportError::Unavailable),
        2 => {
            let mut v = heapless::Vec::new();
            let _ = v.extend_from_slice(&[byte, byte, 0x01, 0x2C]);
            Ok(Response::Data(v))
        }
        _ => {
            let mut s = heapless::String::new();
            let _ = s.push_str("310004123456789");
            Ok(Response::Imsi(s))
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut transport = NullTransport { next_id: 0 };
    let mut loader = RecordLoader::new(&SystemConfig::default());
    loader.begin_load(&mut transport);

    let mut completions = 0u32;
    for pair in data.chunks(2) {
        let id = u32::from(pair[0]);
        match pair.get(1) {
            // A zero opcode supersedes the batch mid-flight.
            Some(0) => {
                loader.begin_load(&mut transport);
                completions = 0;
            }
            Some(b) => {
                if loader.on_result(CorrelationId(id), &outcome_for(*b))
                    == LoadProgress::Completed
                {
                    completions += 1;
                }
            }
            None => {
                let _ = loader.on_result(CorrelationId(id), &Err(TransportError::Timeout));
            }
        }
        // At most one completion per generation; the counter never wraps.
        assert!(completions <= 1);
        assert!(loader.pending() <= 9);
        if loader.is_loaded() {
            assert_eq!(loader.pending(), 0);
        }
    }
});
