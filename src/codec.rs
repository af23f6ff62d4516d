//! Wire codec for chair firmware frames
//!
//! A frame is read two characters at a time. `~X` selects the channel tag `X`
//! for the pairs that follow; any other pair packs one 12-bit value as two
//! 6-bit symbols of a URL-safe base64 alphabet (most significant first).
//!
//! ```text
//! ~P  ZA  ZA  ...  ~I  cI
//! tag  1600 1600   tag  (raw 1800 -> 0.0 degrees)
//! ```

use tracing::trace;

use crate::error::ChairError;
use crate::types::{ChannelTag, DecodedReading, MAX_RAW_VALUE};

/// Symbol alphabet, index = 6-bit value
pub const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// First character of a selector pair
pub const SELECTOR: char = '~';

/// 6-bit index of an alphabet symbol
fn symbol_index(symbol: u8) -> Option<u8> {
    match symbol {
        b'A'..=b'Z' => Some(symbol - b'A'),
        b'a'..=b'z' => Some(symbol - b'a' + 26),
        b'0'..=b'9' => Some(symbol - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

/// Combine a pair of alphabet symbols into a 12-bit raw value
pub fn combine_pair(c0: char, c1: char) -> Result<u16, ChairError> {
    let lookup = |c: char, offset: usize| {
        u8::try_from(c)
            .ok()
            .and_then(symbol_index)
            .ok_or(ChairError::InvalidSymbol { symbol: c, offset })
    };
    let msb = lookup(c0, 0)?;
    let lsb = lookup(c1, 1)?;
    Ok(join(msb, lsb))
}

fn join(msb: u8, lsb: u8) -> u16 {
    let raw = (u16::from(msb) << 6) | u16::from(lsb);
    assert!(raw <= MAX_RAW_VALUE, "two 6-bit symbols exceed 12 bits");
    raw
}

/// Decode a frame into calibrated values per channel tag.
///
/// # Errors
/// * `InvalidFrame` if the frame has an odd number of characters
/// * `UnboundTag` if a value pair appears before any selector
/// * `UnknownTag` if a selector names a tag outside `P`, `I`, `D`, `M`
/// * `InvalidSymbol` if a value pair contains a character outside the alphabet
pub fn decode(frame: &str) -> Result<DecodedReading, ChairError> {
    let chars: Vec<char> = frame.chars().collect();
    if chars.len() % 2 != 0 {
        return Err(ChairError::InvalidFrame(chars.len()));
    }

    let mut decoded = DecodedReading::new();
    let mut active: Option<ChannelTag> = None;

    for (pair_index, pair) in chars.chunks_exact(2).enumerate() {
        let offset = pair_index * 2;
        let (c0, c1) = (pair[0], pair[1]);

        if c0 == SELECTOR {
            active = Some(ChannelTag::from_char(c1)?);
            continue;
        }

        let tag = active.ok_or(ChairError::UnboundTag(offset))?;
        let raw = combine_pair(c0, c1).map_err(|e| match e {
            ChairError::InvalidSymbol { symbol, offset: o } => ChairError::InvalidSymbol {
                symbol,
                offset: offset + o,
            },
            other => other,
        })?;
        decoded.push(tag, tag.calibration().apply(raw));
    }

    trace!(values = decoded.value_count(), "decoded frame");
    Ok(decoded)
}

/// Encode calibrated values into a frame, one selector per group.
///
/// Used by firmware simulators; the inverse of [`decode`] up to the
/// resolution of each tag's calibration.
pub fn encode(groups: &[(ChannelTag, &[f64])]) -> Result<String, ChairError> {
    let mut frame = String::new();
    for (tag, values) in groups {
        frame.push(SELECTOR);
        frame.push(tag.as_char());
        let rule = tag.calibration();
        for &value in values.iter() {
            let raw = rule.invert(value);
            if !(0.0..=f64::from(MAX_RAW_VALUE)).contains(&raw) {
                return Err(ChairError::ValueOutOfRange {
                    tag: tag.as_char(),
                    value,
                });
            }
            let raw = raw as u16;
            frame.push(char::from(ALPHABET[usize::from(raw >> 6)]));
            frame.push(char::from(ALPHABET[usize::from(raw & 0x3f)]));
        }
    }
    Ok(frame)
}

/// Encode a pressure-only frame from raw channel values
pub fn encode_pressure(channels: &[u16]) -> Result<String, ChairError> {
    let values: Vec<f64> = channels.iter().map(|&v| f64::from(v)).collect();
    encode(&[(ChannelTag::Pressure, &values)])
}
