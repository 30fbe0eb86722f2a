//! Engine-internal text form
//!
//! Strings leave the VM as CESU-8: every UTF-16 code unit is encoded on its
//! own, so a supplementary character shows up as two 3-byte surrogate
//! sequences and a lone surrogate survives as a single 3-byte sequence.
//! Incoming text may also use ordinary 4-byte UTF-8 sequences.

/// Encode UTF-16 code units as CESU-8 bytes.
pub fn encode_units(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len());
    for &unit in units {
        let unit = unit as u32;
        match unit {
            0..=0x7f => out.push(unit as u8),
            0x80..=0x7ff => {
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

/// Decode engine text into UTF-16 code units.
///
/// Malformed sequences decode to U+FFFD, one per offending byte.
pub fn decode_units(bytes: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];
        let len = match lead {
            0x00..=0x7f => 1,
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => 0,
        };

        match scalar(bytes, i, len) {
            Some(cp) if cp >= 0x10000 => {
                let v = cp - 0x10000;
                out.push(0xd800 | (v >> 10) as u16);
                out.push(0xdc00 | (v & 0x3ff) as u16);
                i += len;
            }
            Some(cp) => {
                out.push(cp as u16);
                i += len;
            }
            None => {
                out.push(0xfffd);
                i += 1;
            }
        }
    }
    out
}

fn scalar(bytes: &[u8], start: usize, len: usize) -> Option<u32> {
    if len == 0 {
        return None;
    }
    let seq = bytes.get(start..start + len)?;
    if len == 1 {
        return Some(seq[0] as u32);
    }

    let mut cp = (seq[0] as u32) & (0x7f >> len);
    for &b in &seq[1..] {
        if b & 0xc0 != 0x80 {
            return None;
        }
        cp = (cp << 6) | (b & 0x3f) as u32;
    }

    let min = match len {
        2 => 0x80,
        3 => 0x800,
        _ => 0x10000,
    };
    (min..=0x10ffff).contains(&cp).then_some(cp)
}
