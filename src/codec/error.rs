// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the bit-level codecs.

use thiserror::Error;

/// Errors raised by error correction and the cipher layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The error-correction method key is not one of the supported codecs.
    #[error("unknown error-correction method: {0:?} (expected \"hamming\" or \"reed-solomon\")")]
    UnknownMethod(String),
    /// The configured Reed-Solomon parity length is outside 2..=254.
    #[error("invalid Reed-Solomon parity length {0} (must be 2..=254)")]
    InvalidParity(usize),
    /// Reed-Solomon input is not a whole number of bytes.
    #[error("Reed-Solomon input of {0} bits is not byte-aligned")]
    NotByteAligned(usize),
    /// A Reed-Solomon block had more symbol errors than the parity can correct.
    #[error("Reed-Solomon block {block}: too many errors to correct")]
    Uncorrectable { block: usize },
    /// Authentication tag mismatch (wrong key or tampered data).
    #[error("authentication failed (wrong key or tampered payload)")]
    Authentication,
    /// Ciphertext shorter than the nonce and tag prefix.
    #[error("ciphertext of {0} bytes is too short to carry nonce and tag")]
    Truncated(usize),
    /// A bit string contained something other than `0` or `1`.
    #[error("invalid bit {found:?} at position {position}")]
    InvalidBit { position: usize, found: char },
}
