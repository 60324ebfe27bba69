use crate::detect::Bit;
use crate::error::InputError;

/// Bits in the text length header.
pub const TEXT_HEADER_BITS: usize = 16;

/// An ordered sequence of bits to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bits: Vec<bool>,
}

impl Payload {
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Bytes expanded MSB first.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for &byte in bytes {
            push_msb_first(&mut bits, byte as u32, 8);
        }
        Self { bits }
    }

    /// Parse a hex string (two digits per byte).
    pub fn from_hex(hex: &str) -> Result<Self, InputError> {
        let hex = hex.trim();
        if hex.is_empty() || !hex.len().is_multiple_of(2) {
            return Err(InputError::InvalidHex(format!(
                "expected an even, non-zero number of digits, got {}",
                hex.len()
            )));
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| InputError::InvalidHex(format!("bad digits at {i}")))
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Length-prefixed text: a 16-bit big-endian byte count followed by the
    /// UTF-8 bytes, all MSB first.
    pub fn from_text(text: &str) -> Result<Self, InputError> {
        let bytes = text.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| {
            InputError::InvalidText(format!("{} bytes exceeds the 16-bit header", bytes.len()))
        })?;
        let mut bits = Vec::with_capacity(text_bits_len(bytes.len()));
        push_msb_first(&mut bits, len as u32, TEXT_HEADER_BITS);
        for &byte in bytes {
            push_msb_first(&mut bits, byte as u32, 8);
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Hex rendering, or `None` when the length is not a whole number of
    /// bytes.
    pub fn to_hex(&self) -> Option<String> {
        if !self.bits.len().is_multiple_of(8) {
            return None;
        }
        Some(
            self.bits
                .chunks(8)
                .map(|chunk| format!("{:02x}", read_msb_first(chunk)))
                .collect(),
        )
    }
}

/// Payload length of a text of `byte_len` bytes.
pub fn text_bits_len(byte_len: usize) -> usize {
    TEXT_HEADER_BITS + byte_len * 8
}

/// Recover length-prefixed text from decoded bits.
pub fn decode_text(bits: &[Bit]) -> Result<String, InputError> {
    let bits = bits
        .iter()
        .map(|b| b.to_bool())
        .collect::<Option<Vec<bool>>>()
        .ok_or_else(|| InputError::InvalidText("payload has undecided bits".into()))?;
    if bits.len() < TEXT_HEADER_BITS {
        return Err(InputError::InvalidText(format!(
            "{} bits is shorter than the length header",
            bits.len()
        )));
    }
    let len = read_msb_first(&bits[..TEXT_HEADER_BITS]) as usize;
    let body = &bits[TEXT_HEADER_BITS..];
    if body.len() < len * 8 {
        return Err(InputError::InvalidText(format!(
            "header claims {len} bytes, only {} present",
            body.len() / 8
        )));
    }
    let bytes: Vec<u8> = body[..len * 8]
        .chunks(8)
        .map(|chunk| read_msb_first(chunk) as u8)
        .collect();
    String::from_utf8(bytes).map_err(|e| InputError::InvalidText(e.to_string()))
}

fn push_msb_first(bits: &mut Vec<bool>, value: u32, width: usize) {
    for shift in (0..width).rev() {
        bits.push((value >> shift) & 1 == 1);
    }
}

fn read_msb_first(bits: &[bool]) -> u32 {
    bits.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_msb_first() {
        let payload = Payload::from_bytes(&[0b1010_0001]);
        assert_eq!(
            payload.bits(),
            &[true, false, true, false, false, false, false, true]
        );
    }

    #[test]
    fn hex_round_trip() {
        let payload = Payload::from_hex("deadBEEF").unwrap();
        assert_eq!(payload.len(), 32);
        assert_eq!(payload.to_hex().as_deref(), Some("deadbeef"));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert!(Payload::from_hex("").is_err());
        assert!(Payload::from_hex("abc").is_err());
        assert!(Payload::from_hex("zz").is_err());
    }

    #[test]
    fn to_hex_needs_whole_bytes() {
        assert_eq!(Payload::from_bits(vec![true, false, true]).to_hex(), None);
    }

    #[test]
    fn text_has_length_header() {
        let payload = Payload::from_text("fourier").unwrap();
        assert_eq!(payload.len(), text_bits_len(7));
        // 7 = 0b0000_0000_0000_0111
        assert_eq!(&payload.bits()[13..16], &[true, true, true]);
        assert!(payload.bits()[..13].iter().all(|&b| !b));

        let decoded: Vec<Bit> = payload.bits().iter().map(|&b| Bit::from(b)).collect();
        assert_eq!(decode_text(&decoded).unwrap(), "fourier");
    }

    #[test]
    fn decode_text_rejects_unknown_and_truncated() {
        let mut bits: Vec<Bit> = Payload::from_text("hi")
            .unwrap()
            .bits()
            .iter()
            .map(|&b| Bit::from(b))
            .collect();
        bits[20] = Bit::Unknown;
        assert!(decode_text(&bits).is_err());

        let short: Vec<Bit> = Payload::from_text("hello")
            .unwrap()
            .bits()
            .iter()
            .take(30)
            .map(|&b| Bit::from(b))
            .collect();
        assert!(decode_text(&short).is_err());
    }
}
