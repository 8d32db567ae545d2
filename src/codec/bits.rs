// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Bit-vector helpers shared by every codec layer.
//!
//! A bit string is a `Vec<u8>` holding one `0` or `1` per element, most
//! significant bit first within each byte.

use super::error::CodecError;

/// Convert bytes to a bit vector (MSB first within each byte).
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            bits.push((byte >> bit_pos) & 1);
        }
    }
    bits
}

/// Convert a bit vector (MSB first) back to bytes.
/// Pads the last byte with zero bits if `bits.len()` is not a multiple of 8.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bits.len().div_ceil(8));
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= (bit & 1) << (7 - i);
        }
        bytes.push(byte);
    }
    bytes
}

/// Render bits as a `'0'`/`'1'` string.
pub fn to_bit_string(bits: &[u8]) -> String {
    bits.iter().map(|&b| if b & 1 == 1 { '1' } else { '0' }).collect()
}

/// Parse a `'0'`/`'1'` string into bits.
pub fn parse_bit_string(s: &str) -> Result<Vec<u8>, CodecError> {
    s.chars()
        .enumerate()
        .map(|(i, c)| match c {
            '0' => Ok(0),
            '1' => Ok(1),
            other => Err(CodecError::InvalidBit { position: i, found: other }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_first_order() {
        assert_eq!(bytes_to_bits(b"A"), vec![0, 1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn bytes_bits_roundtrip() {
        let data = vec![0x00, 0xFF, 0x5A, 0xC3];
        assert_eq!(bits_to_bytes(&bytes_to_bits(&data)), data);
    }

    #[test]
    fn partial_byte_is_zero_padded() {
        assert_eq!(bits_to_bytes(&[1, 0, 1]), vec![0b1010_0000]);
    }

    #[test]
    fn bit_string_parse_rejects_other_chars() {
        assert_eq!(parse_bit_string("0110").unwrap(), vec![0, 1, 1, 0]);
        assert!(matches!(
            parse_bit_string("01x"),
            Err(CodecError::InvalidBit { position: 2, found: 'x' })
        ));
        assert_eq!(to_bit_string(&[1, 0, 0, 1]), "1001");
    }
}
