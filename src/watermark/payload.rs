// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Watermark payload generation.
//!
//! The payload is derived from project identity alone:
//!
//! 1. `projektname + copyright.jahr + uuid`, UTF-8 encoded, each byte as
//!    an 8-bit group MSB first (the raw bits).
//! 2. The configured error-correction code.
//! 3. The cipher layer, when a key resolves for the active role.
//! 4. An optional Fisher-Yates permutation (`random_bit_assignment`).
//!
//! Steps 1-3 are deterministic, so the detector regenerates the exact payload
//! the embedder used from the same configuration and key. Step 4 is only
//! reproducible when `permutation_seed` is configured.

use std::fmt;
use std::str::FromStr;

use super::config::WatermarkConfig;
use super::error::{Result, WatermarkError};
use super::permute;
use crate::codec::bits::{bytes_to_bits, parse_bit_string, to_bit_string};
use crate::codec::crypto::{self, CipherKey};
use crate::codec::CodecError;

/// Immutable watermark bit sequence, consumed left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkPayload {
    bits: Vec<u8>,
}

impl WatermarkPayload {
    pub fn from_bits(bits: Vec<u8>) -> Self {
        Self { bits: bits.into_iter().map(|b| b & 1).collect() }
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// The payload repeated cyclically to exactly `len` bits.
    pub fn cycled(&self, len: usize) -> Vec<u8> {
        self.bits.iter().copied().cycle().take(len).collect()
    }
}

impl fmt::Display for WatermarkPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_bit_string(&self.bits))
    }
}

impl FromStr for WatermarkPayload {
    type Err = CodecError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_bit_string(s).map(|bits| Self { bits })
    }
}

/// How payload bits were ordered after encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// No permutation.
    Natural,
    /// Permuted with a seed both sides know.
    Seeded(u64),
    /// Permuted with a throwaway seed; not reproducible by a detector.
    Random,
}

/// A generated payload plus what the detector needs to undo it.
#[derive(Debug, Clone)]
pub struct GeneratedPayload {
    /// Bits to embed, in embedding order.
    pub payload: WatermarkPayload,
    /// Identity bits before error correction and encryption.
    pub raw_bits: Vec<u8>,
    pub order: BitOrder,
    permutation: Option<Vec<usize>>,
}

impl GeneratedPayload {
    /// Undo the seeded permutation (identity for natural order).
    pub fn unpermute(&self, bits: &[u8]) -> Vec<u8> {
        match &self.permutation {
            Some(order) if bits.len() == order.len() => permute::invert(bits, order),
            _ => bits.to_vec(),
        }
    }
}

/// Raw identity bits: UTF-8 bytes of the identity string, MSB first.
pub fn identity_bits(config: &WatermarkConfig) -> Vec<u8> {
    bytes_to_bits(config.identity().as_bytes())
}

fn build(config: &WatermarkConfig, key: Option<&CipherKey>, order: BitOrder, seed: Option<u64>) -> Result<GeneratedPayload> {
    let raw_bits = identity_bits(config);
    let mut bits = config.codec()?.encode(&raw_bits)?;

    if let Some(key) = key {
        bits = crypto::encrypt_with(&bits, key, &crypto::derive_nonce(key));
    }

    let permutation = seed.map(|s| permute::permutation(bits.len(), s));
    if let Some(order) = &permutation {
        bits = permute::apply(&bits, order);
    }

    if bits.is_empty() {
        return Err(WatermarkError::EmptyPayload);
    }

    Ok(GeneratedPayload {
        payload: WatermarkPayload::from_bits(bits),
        raw_bits,
        order,
        permutation,
    })
}

/// Generate the payload to embed.
///
/// With `random_bit_assignment` and no `permutation_seed`, a fresh seed is
/// drawn, so output length is stable but content varies between calls.
pub fn generate(config: &WatermarkConfig, key: Option<&CipherKey>) -> Result<GeneratedPayload> {
    match (config.random_bit_assignment, config.permutation_seed) {
        (false, _) => build(config, key, BitOrder::Natural, None),
        (true, Some(seed)) => build(config, key, BitOrder::Seeded(seed), Some(seed)),
        (true, None) => build(config, key, BitOrder::Random, Some(permute::random_seed())),
    }
}

/// Generate the payload a detector compares against.
///
/// Identical to [`generate`] except that an unseeded random permutation
/// cannot be reproduced; the unpermuted payload is returned instead.
pub fn expected(config: &WatermarkConfig, key: Option<&CipherKey>) -> Result<GeneratedPayload> {
    match (config.random_bit_assignment, config.permutation_seed) {
        (true, None) => {
            tracing::warn!(
                "random_bit_assignment without permutation_seed: comparing against the unpermuted payload"
            );
            build(config, key, BitOrder::Natural, None)
        }
        _ => generate(config, key),
    }
}
