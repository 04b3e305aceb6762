//! Modified UTF-8 as stored in `CONSTANT_Utf8` entries.
//!
//! NUL is encoded as `C0 80` and supplementary characters as two encoded
//! surrogates of three bytes each. Unpaired surrogates decode to U+FFFD.

use crate::error::ClassFileError;

pub(crate) fn decode(bytes: &[u8]) -> Result<String, ClassFileError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b0 = bytes[i];
        let (unit, width) = match b0 {
            0x01..=0x7f => (u16::from(b0), 1),
            0xc0..=0xdf => {
                let b1 = continuation(bytes, i + 1)?;
                ((u16::from(b0 & 0x1f) << 6) | b1, 2)
            }
            0xe0..=0xef => {
                let b1 = continuation(bytes, i + 1)?;
                let b2 = continuation(bytes, i + 2)?;
                ((u16::from(b0 & 0x0f) << 12) | (b1 << 6) | b2, 3)
            }
            _ => return Err(ClassFileError::constant(format!("invalid utf8 lead byte {b0:#04x}"))),
        };
        units.push(unit);
        i += width;
    }

    Ok(char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)).collect())
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16, ClassFileError> {
    match bytes.get(at) {
        Some(b) if b & 0xc0 == 0x80 => Ok(u16::from(b & 0x3f)),
        _ => Err(ClassFileError::constant("truncated utf8 sequence")),
    }
}

pub(crate) fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}
