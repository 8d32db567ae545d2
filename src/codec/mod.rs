// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Bit-level codecs: error correction and authenticated encryption.
//!
//! - **Hamming(7,4)** corrects one flipped bit per 7-bit codeword and never
//!   reports failure.
//! - **Reed-Solomon** works on whole bytes, appends a fixed number of parity
//!   bytes per block and reports blocks it cannot reconstruct.
//! - The **cipher layer** seals a bit string with AES-256-GCM-SIV.
//!
//! [`ErrorCorrection`] selects between the two codes by the string key used
//! in configuration files.

pub mod bits;
pub mod crypto;
pub mod error;
pub mod hamming;
pub mod reed_solomon;

use std::fmt;
use std::str::FromStr;

pub use error::CodecError;

/// Supported forward-error-correction codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCorrection {
    Hamming74,
    ReedSolomon { parity_len: usize },
}

impl Default for ErrorCorrection {
    fn default() -> Self {
        Self::Hamming74
    }
}

impl ErrorCorrection {
    /// Configuration key for Hamming(7,4).
    pub const HAMMING: &'static str = "hamming";
    /// Configuration key for Reed-Solomon.
    pub const REED_SOLOMON: &'static str = "reed-solomon";

    /// Select a codec by its configuration key.
    ///
    /// `parity_len` only applies to Reed-Solomon.
    pub fn from_key(key: &str, parity_len: usize) -> Result<Self, CodecError> {
        match key {
            Self::HAMMING => Ok(Self::Hamming74),
            Self::REED_SOLOMON => {
                reed_solomon::validate_parity(parity_len)?;
                Ok(Self::ReedSolomon { parity_len })
            }
            other => Err(CodecError::UnknownMethod(other.to_string())),
        }
    }

    /// Configuration key of this codec.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Hamming74 => Self::HAMMING,
            Self::ReedSolomon { .. } => Self::REED_SOLOMON,
        }
    }

    /// Encode bits. The output is block-aligned and at least as long as the input.
    ///
    /// # Errors
    /// Reed-Solomon requires byte-aligned input ([`CodecError::NotByteAligned`]).
    pub fn encode(&self, bits: &[u8]) -> Result<Vec<u8>, CodecError> {
        match *self {
            Self::Hamming74 => Ok(hamming::encode(bits)),
            Self::ReedSolomon { parity_len } => {
                if bits.len() % 8 != 0 {
                    return Err(CodecError::NotByteAligned(bits.len()));
                }
                let encoded = reed_solomon::encode(&bits::bits_to_bytes(bits), parity_len);
                Ok(bits::bytes_to_bits(&encoded))
            }
        }
    }

    /// Decode bits, correcting what the code allows.
    ///
    /// Hamming always returns a value, possibly wrong after multi-bit damage.
    /// Reed-Solomon drops a trailing partial byte and fails on blocks it
    /// cannot reconstruct.
    pub fn decode(&self, bits: &[u8]) -> Result<Vec<u8>, CodecError> {
        match *self {
            Self::Hamming74 => Ok(hamming::decode(bits)),
            Self::ReedSolomon { parity_len } => {
                let whole = &bits[..bits.len() - bits.len() % 8];
                let (decoded, stats) =
                    reed_solomon::decode(&bits::bits_to_bytes(whole), parity_len)?;
                if stats.corrected > 0 {
                    tracing::debug!(
                        corrected = stats.corrected,
                        blocks = stats.blocks,
                        "Reed-Solomon corrected symbol errors"
                    );
                }
                Ok(bits::bytes_to_bits(&decoded))
            }
        }
    }

    /// Number of bits in one code block.
    pub fn block_bits(&self) -> usize {
        match self {
            Self::Hamming74 => hamming::CODEWORD_BITS,
            Self::ReedSolomon { .. } => 8,
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hamming74 => write!(f, "hamming(7,4)"),
            Self::ReedSolomon { parity_len } => write!(f, "reed-solomon(parity={parity_len})"),
        }
    }
}

impl FromStr for ErrorCorrection {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s, reed_solomon::DEFAULT_PARITY_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_by_key() {
        assert_eq!("hamming".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::Hamming74);
        assert_eq!(
            "reed-solomon".parse::<ErrorCorrection>().unwrap(),
            ErrorCorrection::ReedSolomon { parity_len: 10 }
        );
    }

    #[test]
    fn unknown_key_is_error() {
        assert_eq!(
            "golay".parse::<ErrorCorrection>(),
            Err(CodecError::UnknownMethod("golay".into()))
        );
    }

    #[test]
    fn hamming_length_invariant() {
        let codec = ErrorCorrection::Hamming74;
        for n in [0usize, 1, 4, 5, 8, 13, 136] {
            let bits = vec![1u8; n];
            assert_eq!(codec.encode(&bits).unwrap().len(), n.div_ceil(4) * 7);
        }
    }

    #[test]
    fn reed_solomon_length_invariant() {
        let codec = ErrorCorrection::from_key("reed-solomon", 10).unwrap();
        let bits = bits::bytes_to_bits(b"Acme2024abcd-1234");
        let encoded = codec.encode(&bits).unwrap();
        assert_eq!(encoded.len() / 8, 17 + 10);
        assert_eq!(codec.decode(&encoded).unwrap(), bits);
    }

    #[test]
    fn reed_solomon_rejects_unaligned_input() {
        let codec = ErrorCorrection::ReedSolomon { parity_len: 10 };
        assert_eq!(codec.encode(&[1, 0, 1]), Err(CodecError::NotByteAligned(3)));
    }

    #[test]
    fn reed_solomon_surfaces_uncorrectable_blocks() {
        let codec = ErrorCorrection::ReedSolomon { parity_len: 32 };
        let mut encoded = codec.encode(&bits::bytes_to_bits(&[9u8; 24])).unwrap();
        // one flipped bit in each of 20 bytes: 20 symbol errors > t=16
        for byte in 0..20 {
            encoded[byte * 8] ^= 1;
        }
        assert!(matches!(codec.decode(&encoded), Err(CodecError::Uncorrectable { .. })));
    }
}
