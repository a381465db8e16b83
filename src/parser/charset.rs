//! Byte-level decoding: transfer envelopes (base64, quoted-printable) and charsets.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::{debug, warn};

/// Base64 engine that tolerates missing padding and trailing bits,
/// both common in hand-built MIME bodies.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode a base64 body, ignoring line breaks and other whitespace.
///
/// Returns `None` if the data is not valid base64 even after cleanup.
pub fn decode_base64(input: &[u8]) -> Option<Vec<u8>> {
    let cleaned: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match LENIENT_BASE64.decode(&cleaned) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!(error = %e, "Invalid base64 payload");
            None
        }
    }
}

/// Decode quoted-printable data (RFC 2045 §6.7).
///
/// Soft line breaks (`=` at end of line) are removed and `=XX` escapes become
/// the corresponding byte. Malformed escapes are kept literally.
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] != b'=' {
            result.push(input[i]);
            i += 1;
            continue;
        }

        let rest = &input[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(byte) = rest.get(..2).and_then(hex_pair) {
            result.push(byte);
            i += 3;
        } else {
            result.push(b'=');
            i += 1;
        }
    }
    result
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
pub fn decode_q_encoding(input: &str) -> Vec<u8> {
    let spaced: Vec<u8> = input
        .bytes()
        .map(|b| if b == b'_' { b' ' } else { b })
        .collect();
    decode_quoted_printable(&spaced)
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    let hi = (pair[0] as char).to_digit(16)?;
    let lo = (pair[1] as char).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// Decode bytes using a declared charset.
///
/// Missing charsets are treated as UTF-8. Unknown labels, and bytes that are
/// malformed for the declared charset, fall back to UTF-8 with replacement
/// characters instead of failing.
pub fn decode_charset(charset: Option<&str>, bytes: &[u8]) -> String {
    let label = charset.map(str::trim).filter(|c| !c.is_empty());

    let Some(label) = label else {
        return String::from_utf8_lossy(bytes).into_owned();
    };

    // encoding_rs maps ASCII labels to windows-1252, which accepts any byte.
    if is_ascii_label(label) {
        if !bytes.is_ascii() {
            warn!(
                charset = label,
                "Payload is not valid for its declared charset, falling back to UTF-8 lossy"
            );
        }
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) else {
        warn!(charset = label, "Unknown charset, falling back to UTF-8 lossy");
        return String::from_utf8_lossy(bytes).into_owned();
    };

    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(Cow::Borrowed(s)) => s.to_string(),
        Some(Cow::Owned(s)) => s,
        None => {
            warn!(
                charset = label,
                "Payload is not valid for its declared charset, falling back to UTF-8 lossy"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn is_ascii_label(label: &str) -> bool {
    ["us-ascii", "ascii", "us", "ansi_x3.4-1968", "iso646-us"]
        .iter()
        .any(|l| label.eq_ignore_ascii_case(l))
}
