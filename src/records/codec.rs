//! Fixed-layout card file codecs.
//!
//! Each elementary file has a dedicated decode rule; the byte layouts
//! follow the 3GPP2 record formats (C.S0005 / C.S0065) bit for bit:
//!
//! - swapped-nibble BCD digit strings (ICCID)
//! - CDMA BCD digit strings (MDN)
//! - 10-bit packed MIN digit groups (IMSI_M)
//! - GSM 7-bit packed alphabet, Latin-1 and UTF-16 text (SPN)
//! - little-endian SID/NID pair lists (CDMAHOME)
//! - big-endian PRL version (EPRL header)
//!
//! Encoders exist for the digit and septet formats so round-trip
//! properties can be checked against the documented layouts.

use core::fmt::Write as _;

use crate::error::DecodeError;

/// Decoded digit string (IMSI/ICCID/MDN/MIN all fit in 20).
pub type DigitString = heapless::String<20>;

/// Decoded service-provider name.
pub type NameString = heapless::String<32>;

/// Two-letter ISO-639 language code.
pub type LangCode = [u8; 2];

// ───────────────────────────────────────────────────────────────
// Swapped-nibble BCD (ICCID)
// ───────────────────────────────────────────────────────────────

/// Decode a swapped-nibble BCD digit string.  Low nibble first; a 0xF
/// nibble (or any non-decimal nibble) terminates the string.
pub fn bcd_to_string(data: &[u8]) -> Result<DigitString, DecodeError> {
    let mut out = DigitString::new();
    'bytes: for byte in data {
        for nibble in [byte & 0x0F, (byte >> 4) & 0x0F] {
            if nibble > 9 {
                break 'bytes;
            }
            out.push((b'0' + nibble) as char)
                .map_err(|()| DecodeError::CapacityExceeded)?;
        }
    }
    Ok(out)
}

/// Encode decimal digits as swapped-nibble BCD, 0xF-padding an odd count.
pub fn string_to_bcd(digits: &str) -> Result<heapless::Vec<u8, 10>, DecodeError> {
    let mut out = heapless::Vec::new();
    let bytes = digits.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let lo = digit_value(bytes[i])?;
        let hi = if i + 1 < bytes.len() {
            digit_value(bytes[i + 1])?
        } else {
            0x0F
        };
        out.push((hi << 4) | lo)
            .map_err(|_| DecodeError::CapacityExceeded)?;
        i += 2;
    }
    Ok(out)
}

fn digit_value(b: u8) -> Result<u8, DecodeError> {
    if b.is_ascii_digit() {
        Ok(b - b'0')
    } else {
        Err(DecodeError::InvalidDigits)
    }
}

// ───────────────────────────────────────────────────────────────
// CDMA BCD (MDN)
// ───────────────────────────────────────────────────────────────

/// Decode `num_digits` CDMA BCD digits starting at `offset`.  Per C.S0005
/// the digit '0' is encoded as 0b1010, so any nibble above 9 decodes as 0.
pub fn cdma_bcd_to_string(
    data: &[u8],
    offset: usize,
    num_digits: usize,
) -> Result<DigitString, DecodeError> {
    let needed = offset + num_digits.div_ceil(2);
    if data.len() < needed {
        return Err(DecodeError::Truncated);
    }
    let mut out = DigitString::new();
    let mut count = 0;
    let mut idx = offset;
    while count < num_digits {
        let byte = data[idx];
        for nibble in [byte & 0x0F, (byte >> 4) & 0x0F] {
            if count == num_digits {
                break;
            }
            let digit = if nibble > 9 { 0 } else { nibble };
            out.push((b'0' + digit) as char)
                .map_err(|()| DecodeError::CapacityExceeded)?;
            count += 1;
        }
        idx += 1;
    }
    Ok(out)
}

/// Encode decimal digits as CDMA BCD ('0' becomes 0b1010).
pub fn string_to_cdma_bcd(digits: &str) -> Result<heapless::Vec<u8, 10>, DecodeError> {
    let mut out = heapless::Vec::new();
    let bytes = digits.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let lo = cdma_digit(bytes[i])?;
        let hi = if i + 1 < bytes.len() {
            cdma_digit(bytes[i + 1])?
        } else {
            0
        };
        out.push((hi << 4) | lo)
            .map_err(|_| DecodeError::CapacityExceeded)?;
        i += 2;
    }
    Ok(out)
}

fn cdma_digit(b: u8) -> Result<u8, DecodeError> {
    match b {
        b'0' => Ok(0x0A),
        b'1'..=b'9' => Ok(b - b'0'),
        _ => Err(DecodeError::InvalidDigits),
    }
}

/// Decode the MDN record (C.S0065 5.2.35): low nibble of byte 0 is the
/// digit count, digits follow as CDMA BCD.
pub fn decode_mdn(data: &[u8]) -> Result<DigitString, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Truncated);
    }
    let digits = (data[0] & 0x0F) as usize;
    cdma_bcd_to_string(data, 1, digits)
}

// ───────────────────────────────────────────────────────────────
// GSM 7-bit packed alphabet
// ───────────────────────────────────────────────────────────────

/// Unpack `num_septets` 7-bit characters from `data` (LSB-first packing).
pub fn gsm7_unpack(data: &[u8], num_septets: usize) -> Result<NameString, DecodeError> {
    let mut out = NameString::new();
    for i in 0..num_septets {
        let bit = i * 7;
        let byte = bit / 8;
        let shift = bit % 8;
        if byte >= data.len() {
            return Err(DecodeError::Truncated);
        }
        let mut septet = u16::from(data[byte]) >> shift;
        if shift > 1 {
            if byte + 1 >= data.len() {
                return Err(DecodeError::Truncated);
            }
            septet |= u16::from(data[byte + 1]) << (8 - shift);
        }
        out.push(septet_to_char((septet & 0x7F) as u8))
            .map_err(|()| DecodeError::CapacityExceeded)?;
    }
    Ok(out)
}

/// Pack text into GSM 7-bit septets.  Only characters representable in the
/// basic alphabet are accepted.
pub fn gsm7_pack(text: &str) -> Result<heapless::Vec<u8, 32>, DecodeError> {
    let mut out = heapless::Vec::new();
    let n = text.chars().count();
    let total_bytes = (n * 7).div_ceil(8);
    out.resize(total_bytes, 0)
        .map_err(|()| DecodeError::CapacityExceeded)?;
    for (i, ch) in text.chars().enumerate() {
        let septet = u16::from(char_to_septet(ch)?);
        let bit = i * 7;
        let byte = bit / 8;
        let shift = bit % 8;
        out[byte] |= (septet << shift) as u8;
        if shift > 1 {
            out[byte + 1] |= (septet >> (8 - shift)) as u8;
        }
    }
    Ok(out)
}

/// Basic GSM alphabet, common subset.  Values that coincide with ASCII are
/// passed through; the handful of divergent positions we care about are
/// mapped explicitly, everything else becomes a space.
fn septet_to_char(septet: u8) -> char {
    match septet {
        0x00 => '@',
        0x02 => '$',
        0x11 => '_',
        0x20..=0x5A | 0x61..=0x7A => septet as char,
        _ => ' ',
    }
}

fn char_to_septet(ch: char) -> Result<u8, DecodeError> {
    match ch {
        '@' => Ok(0x00),
        '$' => Ok(0x02),
        '_' => Ok(0x11),
        ' '..='Z' | 'a'..='z' => Ok(ch as u8),
        _ => Err(DecodeError::UnsupportedEncoding),
    }
}

// ───────────────────────────────────────────────────────────────
// Service-provider name (C.S0065 5.2.32)
// ───────────────────────────────────────────────────────────────

/// CDMA user-data encoding identifiers used by EF_CSIM_SPN.
mod spn_encoding {
    pub const OCTET: u8 = 0x00;
    pub const SEVEN_BIT_ASCII: u8 = 0x02;
    pub const IA5: u8 = 0x03;
    pub const UNICODE_16: u8 = 0x04;
    pub const LATIN: u8 = 0x08;
    pub const GSM_7BIT: u8 = 0x09;
}

/// Decode EF_CSIM_SPN: returns the display-condition flag and the name.
/// Layout: byte 0 bit 0 = display condition, byte 1 = encoding, byte 2 =
/// language, bytes 3.. = up to 32 name bytes terminated by 0xFF filler.
pub fn decode_spn(data: &[u8]) -> Result<(bool, NameString), DecodeError> {
    if data.len() < 3 {
        return Err(DecodeError::Truncated);
    }
    let display_condition = (data[0] & 0x01) != 0;
    let encoding = data[1];

    let payload = &data[3..data.len().min(3 + 32)];
    let used = payload.iter().position(|b| *b == 0xFF).unwrap_or(payload.len());
    if used == 0 {
        return Ok((display_condition, NameString::new()));
    }
    let payload = &payload[..used];

    let name = match encoding {
        spn_encoding::OCTET | spn_encoding::LATIN => latin1_to_string(payload)?,
        spn_encoding::IA5 | spn_encoding::GSM_7BIT | spn_encoding::SEVEN_BIT_ASCII => {
            // Unpack from a zero-padded buffer so the trailing septet of an
            // unaligned name never reads past the payload.
            let mut padded = [0u8; 33];
            padded[..used].copy_from_slice(payload);
            gsm7_unpack(&padded, used * 8 / 7)?
        }
        spn_encoding::UNICODE_16 => utf16_to_string(payload)?,
        _ => return Err(DecodeError::UnsupportedEncoding),
    };
    Ok((display_condition, name))
}

fn latin1_to_string(data: &[u8]) -> Result<NameString, DecodeError> {
    let mut out = NameString::new();
    for b in data {
        out.push(*b as char)
            .map_err(|()| DecodeError::CapacityExceeded)?;
    }
    Ok(out)
}

fn utf16_to_string(data: &[u8]) -> Result<NameString, DecodeError> {
    let mut out = NameString::new();
    let units = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    for ch in char::decode_utf16(units) {
        let ch = ch.map_err(|_| DecodeError::UnsupportedEncoding)?;
        out.push(ch).map_err(|()| DecodeError::CapacityExceeded)?;
    }
    Ok(out)
}

// ───────────────────────────────────────────────────────────────
// IMSI_M / MIN (C.S0065 5.2.2, C.S0005 2.3.1)
// ───────────────────────────────────────────────────────────────

/// Undo the +111 bias on a packed 3-digit MIN group.  Each correction
/// restores a digit that was encoded as 10 (the representation of '0').
fn adjust_min_digits(raw: u32) -> u32 {
    let mut d = raw + 111;
    if d % 10 == 0 {
        d -= 10;
    }
    if (d / 10) % 10 == 0 {
        d -= 100;
    }
    if (d / 100) % 10 == 0 {
        d -= 1000;
    }
    d
}

/// Decode the MIN from an IMSI_M record.  Returns `None` when the
/// provisioned flag (byte 7, bit 7) is clear.
pub fn decode_min(data: &[u8]) -> Result<Option<DigitString>, DecodeError> {
    if data.len() < 8 {
        return Err(DecodeError::Truncated);
    }
    if data[7] & 0x80 == 0 {
        return Ok(None);
    }

    let first3 = (u32::from(data[2] & 0x03) << 8) + u32::from(data[1]);
    let second3 = ((u32::from(data[5]) << 8) | u32::from(data[4])) >> 6;
    let mut digit7 = (data[4] >> 2) & 0x0F;
    if digit7 > 0x09 {
        digit7 = 0;
    }
    let last3 = (u32::from(data[4] & 0x03) << 8) | u32::from(data[3]);

    let mut out = DigitString::new();
    write!(
        out,
        "{:03}{:03}{}{:03}",
        adjust_min_digits(first3),
        adjust_min_digits(second3),
        digit7,
        adjust_min_digits(last3)
    )
    .map_err(|_| DecodeError::CapacityExceeded)?;
    Ok(Some(out))
}

// ───────────────────────────────────────────────────────────────
// CDMA home systems (C.S0065 5.2.8)
// ───────────────────────────────────────────────────────────────

pub type SystemIdList = heapless::Vec<u16, 8>;

/// Decode the home SID/NID pair list.  Each valid record is exactly
/// 5 bytes: SID as LE u16 at 0..2, NID as LE u16 at 2..4.  Records of any
/// other length are skipped.  An empty result is an error so the fields
/// stay absent rather than becoming empty lists.
pub fn decode_cdma_home<const R: usize>(
    records: &[heapless::Vec<u8, R>],
) -> Result<(SystemIdList, SystemIdList), DecodeError> {
    let mut sids = SystemIdList::new();
    let mut nids = SystemIdList::new();
    for rec in records {
        if rec.len() != 5 {
            continue;
        }
        let sid = u16::from_le_bytes([rec[0], rec[1]]);
        let nid = u16::from_le_bytes([rec[2], rec[3]]);
        sids.push(sid).map_err(|_| DecodeError::CapacityExceeded)?;
        nids.push(nid).map_err(|_| DecodeError::CapacityExceeded)?;
    }
    if sids.is_empty() {
        return Err(DecodeError::EmptyFile);
    }
    Ok((sids, nids))
}

/// Encode SID/NID pairs into 5-byte CDMAHOME records.
pub fn encode_cdma_home(
    sids: &[u16],
    nids: &[u16],
) -> heapless::Vec<heapless::Vec<u8, 16>, 8> {
    let mut out = heapless::Vec::new();
    for (sid, nid) in sids.iter().zip(nids) {
        let mut rec: heapless::Vec<u8, 16> = heapless::Vec::new();
        let _ = rec.extend_from_slice(&sid.to_le_bytes());
        let _ = rec.extend_from_slice(&nid.to_le_bytes());
        let _ = rec.push(0);
        let _ = out.push(rec);
    }
    out
}

// ───────────────────────────────────────────────────────────────
// PRL version (C.S0065 5.2.57, C.S0016 3.5.5)
// ───────────────────────────────────────────────────────────────

/// Extract the PRL version from the EPRL header: BE u16 at bytes 2..4.
pub fn decode_prl_version(data: &[u8]) -> Result<u16, DecodeError> {
    if data.len() <= 3 {
        return Err(DecodeError::Truncated);
    }
    Ok(u16::from_be_bytes([data[2], data[3]]))
}

// ───────────────────────────────────────────────────────────────
// Language preference tables
// ───────────────────────────────────────────────────────────────

pub type LangList = heapless::Vec<LangCode, 8>;

/// Map a CSIM EF_LI entry (C.S0065 5.2.26) to ISO-639.  Each entry is two
/// bytes; the second byte carries the language code.
pub fn decode_csim_languages(data: &[u8]) -> LangList {
    let mut out = LangList::new();
    for pair in data.chunks_exact(2) {
        let code: LangCode = match pair[1] {
            0x01 => *b"en",
            0x02 => *b"fr",
            0x03 => *b"es",
            0x04 => *b"ja",
            0x05 => *b"ko",
            0x06 => *b"zh",
            0x07 => *b"he",
            _ => *b"  ",
        };
        if out.push(code).is_err() {
            break;
        }
    }
    out
}

/// EF_PL (TS 102.221) already stores ISO-639 byte pairs.
pub fn decode_iso_languages(data: &[u8]) -> LangList {
    let mut out = LangList::new();
    for pair in data.chunks_exact(2) {
        if out.push([pair[0], pair[1]]).is_err() {
            break;
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────
// IMSI validation
// ───────────────────────────────────────────────────────────────

/// An IMSI is MCC+MNC+MSIN: decimal, bounded length.
pub fn validate_imsi(imsi: &str, min_digits: usize, max_digits: usize) -> bool {
    imsi.len() >= min_digits
        && imsi.len() <= max_digits
        && imsi.bytes().all(|b| b.is_ascii_digit())
}
