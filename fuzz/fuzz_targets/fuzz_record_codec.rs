//! Fuzz target: card file decoders.
//!
//! Drives arbitrary byte soup through every elementary-file decoder and
//! asserts the totality contract: a typed error or a bounded value,
//! never a panic, never an out-of-range digit.
//!
//! cargo fuzz run fuzz_record_codec

#![no_main]

use cardlink::records::codec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(digits) = codec::bcd_to_string(data) {
        assert!(digits.bytes().all(|b| b.is_ascii_digit()));
    }

    if let Ok(mdn) = codec::decode_mdn(data) {
        assert!(mdn.len() <= 15, "MDN longer than a dialable number");
    }

    if let Ok(Some(min)) = codec::decode_min(data) {
        assert!(min.bytes().all(|b| b.is_ascii_digit()));
    }

    if let Ok((_, name)) = codec::decode_spn(data) {
        assert!(name.len() <= 32);
    }

    let _ = codec::decode_prl_version(data);
    let _ = codec::decode_csim_languages(data);
    let _ = codec::decode_iso_languages(data);

    // Record-shaped input for the SID/NID decoder.
    let mut records: heapless::Vec<heapless::Vec<u8, 16>, 8> = heapless::Vec::new();
    for chunk in data.chunks(5).take(8) {
        let mut rec = heapless::Vec::new();
        let _ = rec.extend_from_slice(chunk);
        let _ = records.push(rec);
    }
    if let Ok((sids, nids)) = codec::decode_cdma_home(records.as_slice()) {
        assert_eq!(sids.len(), nids.len());
        assert!(!sids.is_empty());
    }
});
