//! Modified UTF-7 mailbox-name codec (RFC 3501 section 5.1.3)
//!
//! IMAP mailbox names are 7-bit on the wire. Names containing other
//! characters travel in "modified UTF-7": printable ASCII stays as-is,
//! `&` becomes `&-`, and every other run of characters becomes
//! `&<base64>-`, where the payload is big-endian UTF-16 encoded with a
//! base64 alphabet that uses `,` instead of `/`.
//!
//! Both directions are strict: [`encode`] rejects control characters
//! and [`decode`] rejects malformed transport sequences, so
//! `decode(encode(name)) == name` holds for every encodable name.

use crate::error::{Error, Result};
use base64::Engine;
use base64::alphabet::Alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;

const ALPHABET: Alphabet = match Alphabet::new(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+,",
) {
    Ok(alphabet) => alphabet,
    Err(_) => panic!("modified UTF-7 alphabet is invalid"),
};

/// Unpadded base64 over the modified UTF-7 alphabet.
const B64: GeneralPurpose = GeneralPurpose::new(
    &ALPHABET,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Encode a display name into its 7-bit transport form.
///
/// The output is minimal and normalised: direct characters are never
/// shift-encoded, `&` only ever appears as the `&-` escape or a shift,
/// and every encoded run carries an explicit `-` terminator.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the name contains control
/// characters, which have no place in a mailbox name.
pub fn encode(display: &str) -> Result<String> {
    let mut out = String::with_capacity(display.len());
    let mut pending: Vec<u8> = Vec::new();

    for ch in display.chars() {
        if ch.is_control() {
            return Err(Error::Encoding(format!(
                "control character U+{:04X} in mailbox name",
                u32::from(ch)
            )));
        }
        if ch == '&' {
            flush(&mut out, &mut pending);
            out.push_str("&-");
        } else if matches!(ch, ' '..='~') {
            flush(&mut out, &mut pending);
            out.push(ch);
        } else {
            let mut units = [0_u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                pending.extend_from_slice(&unit.to_be_bytes());
            }
        }
    }

    flush(&mut out, &mut pending);
    Ok(out)
}

/// Decode a transport-form name back to its display form.
///
/// # Errors
///
/// Returns [`Error::Encoding`] on malformed input: 8-bit or control
/// bytes, an unterminated `&` shift sequence, invalid base64, a
/// truncated UTF-16 payload, or an unpaired surrogate.
pub fn decode(transport: &str) -> Result<String> {
    let bytes = transport.as_bytes();
    let mut out = String::with_capacity(transport.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'&' {
            // The terminating '-' cannot be a base64 character, so the
            // first one after the shift always ends the sequence.
            let end = bytes[i + 1..]
                .iter()
                .position(|&c| c == b'-')
                .map(|off| i + 1 + off)
                .ok_or_else(|| {
                    Error::Encoding("unterminated & sequence".into())
                })?;
            if end == i + 1 {
                out.push('&');
            } else {
                decode_run(&transport[i + 1..end], &mut out)?;
            }
            i = end + 1;
        } else if matches!(b, b' '..=b'~') {
            out.push(char::from(b));
            i += 1;
        } else {
            return Err(Error::Encoding(format!(
                "invalid byte 0x{b:02X} in transport name"
            )));
        }
    }

    Ok(out)
}

/// Append the base64 of the pending UTF-16 bytes as one shift run.
fn flush(out: &mut String, pending: &mut Vec<u8>) {
    if pending.is_empty() {
        return;
    }
    out.push('&');
    B64.encode_string(pending.as_slice(), out);
    out.push('-');
    pending.clear();
}

/// Decode one `&...-` run (without the delimiters) onto `out`.
fn decode_run(chunk: &str, out: &mut String) -> Result<()> {
    let raw = B64.decode(chunk).map_err(|e| {
        Error::Encoding(format!("invalid base64 in transport name: {e}"))
    })?;
    if raw.len() % 2 != 0 {
        return Err(Error::Encoding(
            "truncated UTF-16 payload in transport name".into(),
        ));
    }
    let units = raw
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    for ch in char::decode_utf16(units) {
        out.push(ch.map_err(|e| {
            Error::Encoding(format!("unpaired surrogate in transport name: {e}"))
        })?);
    }
    Ok(())
}
