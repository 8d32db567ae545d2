// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Hamming(7,4) single-error-correcting code.
//!
//! Each 4-bit group `d0..d3` becomes the codeword `[p1, p2, d0, p3, d1, d2, d3]`
//! with
//!
//! ```text
//! p1 = d0 ^ d1 ^ d3   (covers positions 1, 3, 5, 7)
//! p2 = d0 ^ d2 ^ d3   (covers positions 2, 3, 6, 7)
//! p3 = d1 ^ d2 ^ d3   (covers positions 4, 5, 6, 7)
//! ```
//!
//! Decoding never fails. A double-bit error inside one codeword produces a
//! syndrome that points at the wrong position and silently yields wrong data.

/// Data bits per codeword.
pub const DATA_BITS: usize = 4;
/// Codeword length in bits.
pub const CODEWORD_BITS: usize = 7;

/// Encoded length for `data_len` input bits.
pub fn encoded_len(data_len: usize) -> usize {
    data_len.div_ceil(DATA_BITS) * CODEWORD_BITS
}

/// Encode bits, zero-padding the input to a multiple of 4.
pub fn encode(bits: &[u8]) -> Vec<u8> {
    let mut coded = Vec::with_capacity(encoded_len(bits.len()));
    for chunk in bits.chunks(DATA_BITS) {
        let mut d = [0u8; DATA_BITS];
        for (slot, &bit) in d.iter_mut().zip(chunk) {
            *slot = bit & 1;
        }
        let p1 = d[0] ^ d[1] ^ d[3];
        let p2 = d[0] ^ d[2] ^ d[3];
        let p3 = d[1] ^ d[2] ^ d[3];
        coded.extend_from_slice(&[p1, p2, d[0], p3, d[1], d[2], d[3]]);
    }
    coded
}

/// Syndrome of one codeword: the 1-based position of a single flipped bit, or 0.
fn syndrome(cw: &[u8; CODEWORD_BITS]) -> usize {
    let s1 = cw[0] ^ cw[2] ^ cw[4] ^ cw[6];
    let s2 = cw[1] ^ cw[2] ^ cw[5] ^ cw[6];
    let s3 = cw[3] ^ cw[4] ^ cw[5] ^ cw[6];
    ((s3 << 2) | (s2 << 1) | s1) as usize
}

/// Decode bits, correcting up to one flipped bit per codeword.
///
/// A trailing partial codeword (fewer than 7 bits) is dropped.
pub fn decode(bits: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(bits.len() / CODEWORD_BITS * DATA_BITS);
    for block in bits.chunks_exact(CODEWORD_BITS) {
        let mut cw = [0u8; CODEWORD_BITS];
        for (slot, &bit) in cw.iter_mut().zip(block) {
            *slot = bit & 1;
        }
        let s = syndrome(&cw);
        if (1..=CODEWORD_BITS).contains(&s) {
            cw[s - 1] ^= 1;
        }
        decoded.extend_from_slice(&[cw[2], cw[4], cw[5], cw[6]]);
    }
    decoded
}
