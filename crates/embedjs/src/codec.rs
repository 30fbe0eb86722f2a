//! Text crossing the boundary
//!
//! Host text is normalised to UTF-8 before it reaches the engine. Engine
//! text comes back with supplementary characters split into surrogate
//! pairs; those are recomposed here, and an unpaired half is an error the
//! host never gets to see.

use crate::error::EncodingError;

/// Host text in one of the encodings a caller may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostText {
    Utf8(String),
    /// UTF-16 code units, e.g. decoded from UTF-16LE bytes
    Utf16(Vec<u16>),
    /// ISO-8859-1 bytes
    Latin1(Vec<u8>),
    /// Bytes claimed to be UTF-8, not yet validated
    Bytes(Vec<u8>),
}

impl HostText {
    /// UTF-16 code units from little-endian bytes. A trailing odd byte is
    /// dropped.
    pub fn utf16_le(bytes: &[u8]) -> Self {
        Self::Utf16(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }
}

impl From<&str> for HostText {
    fn from(s: &str) -> Self {
        Self::Utf8(s.to_owned())
    }
}

impl From<String> for HostText {
    fn from(s: String) -> Self {
        Self::Utf8(s)
    }
}

/// Transcode host text into engine-ready UTF-8.
pub fn to_engine_text(text: HostText) -> Result<String, EncodingError> {
    match text {
        HostText::Utf8(s) => Ok(s),
        HostText::Utf16(units) => {
            let mut out = String::with_capacity(units.len());
            let mut index = 0;
            for decoded in char::decode_utf16(units.iter().copied()) {
                match decoded {
                    Ok(c) => {
                        out.push(c);
                        index += c.len_utf16();
                    }
                    Err(err) => {
                        return Err(EncodingError::InvalidUtf16 {
                            unit: err.unpaired_surrogate(),
                            index,
                        });
                    }
                }
            }
            Ok(out)
        }
        HostText::Latin1(bytes) => Ok(bytes.into_iter().map(char::from).collect()),
        HostText::Bytes(bytes) => String::from_utf8(bytes).map_err(|err| EncodingError::InvalidUtf8 {
            offset: err.utf8_error().valid_up_to(),
        }),
    }
}

/// Turn engine text into host UTF-8, recomposing surrogate pairs.
pub fn from_engine_text(bytes: &[u8]) -> Result<String, EncodingError> {
    // Plain UTF-8 never encodes surrogates, so it needs no recomposition.
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(s.to_owned());
    }

    let mut out = String::with_capacity(bytes.len());
    let mut offset = 0;
    while offset < bytes.len() {
        let (cp, len) = decode_at(bytes, offset).ok_or(EncodingError::InvalidUtf8 { offset })?;
        let cp = match cp {
            0xd800..=0xdbff => match decode_at(bytes, offset + len) {
                Some((low @ 0xdc00..=0xdfff, low_len)) => {
                    let combined = 0x10000 + ((cp - 0xd800) << 10) + (low - 0xdc00);
                    offset += low_len;
                    combined
                }
                _ => return Err(lone_surrogate(cp, offset)),
            },
            0xdc00..=0xdfff => return Err(lone_surrogate(cp, offset)),
            _ => cp,
        };
        let c = char::from_u32(cp).ok_or(EncodingError::InvalidUtf8 { offset })?;
        out.push(c);
        offset += len;
    }
    Ok(out)
}

/// Like [`from_engine_text`], substituting U+FFFD for anything malformed.
pub(crate) fn from_engine_text_lossy(bytes: &[u8]) -> String {
    let units = embedjs_engine::text::decode_units(bytes);
    String::from_utf16_lossy(&units)
}

fn lone_surrogate(cp: u32, offset: usize) -> EncodingError {
    EncodingError::LoneSurrogate {
        unit: cp as u16,
        offset,
    }
}

/// Decode one sequence, allowing 3-byte surrogate encodings.
fn decode_at(bytes: &[u8], start: usize) -> Option<(u32, usize)> {
    let lead = *bytes.get(start)?;
    let (len, init, min) = match lead {
        0x00..=0x7f => return Some((lead as u32, 1)),
        0xc0..=0xdf => (2, lead & 0x1f, 0x80),
        0xe0..=0xef => (3, lead & 0x0f, 0x800),
        0xf0..=0xf7 => (4, lead & 0x07, 0x10000),
        _ => return None,
    };

    let tail = bytes.get(start + 1..start + len)?;
    let mut cp = init as u32;
    for &b in tail {
        if b & 0xc0 != 0x80 {
            return None;
        }
        cp = (cp << 6) | (b & 0x3f) as u32;
    }
    (min..=0x10ffff).contains(&cp).then_some((cp, len))
}
