// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Reed-Solomon error correction over GF(2^8).
//!
//! Implements RS(255, 255 - parity) with the primitive polynomial 0x11D
//! (x^8+x^4+x^3+x^2+1), generator roots α^0 .. α^{parity-1}. Encoding is
//! systematic: each block of at most `255 - parity` data bytes is followed by
//! `parity` check bytes. Decoding uses Berlekamp-Massey, Chien search and
//! Forney; shortened blocks are treated as zero-padded at the front.

use super::error::CodecError;

/// Primitive polynomial for GF(2^8): x^8 + x^4 + x^3 + x^2 + 1 = 0x11D.
const PRIM_POLY: u16 = 0x11D;

/// Maximum RS block size.
const N_MAX: usize = 255;

/// Parity bytes used when the configuration does not say otherwise.
pub const DEFAULT_PARITY_LEN: usize = 10;

// --- GF(2^8) Arithmetic ---

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn build_gf_tables() -> GfTables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];

    let mut x: u16 = 1;
    for i in 0..255u16 {
        exp[i as usize] = x as u8;
        exp[(i + 255) as usize] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIM_POLY;
        }
    }
    exp[510] = exp[0];
    exp[511] = exp[1];

    GfTables { exp, log }
}

fn gf_tables() -> &'static GfTables {
    use std::sync::OnceLock;
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(build_gf_tables)
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = gf_tables();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Multiplicative inverse. Callers guarantee `a != 0`.
fn gf_inv(a: u8) -> u8 {
    let t = gf_tables();
    t.exp[255 - t.log[a as usize] as usize]
}

/// Evaluate polynomial at x. poly[0] is the highest-degree coefficient.
fn poly_eval(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Evaluate polynomial in ascending power format at x.
fn eval_asc(poly: &[u8], x: u8) -> u8 {
    let mut result = 0u8;
    let mut x_pow = 1u8;
    for &coeff in poly {
        result ^= gf_mul(coeff, x_pow);
        x_pow = gf_mul(x_pow, x);
    }
    result
}

fn poly_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut result = vec![0u8; a.len() + b.len() - 1];
    for (i, &ac) in a.iter().enumerate() {
        for (j, &bc) in b.iter().enumerate() {
            result[i + j] ^= gf_mul(ac, bc);
        }
    }
    result
}

/// g(x) = prod_{i=0}^{parity-1} (x - α^i), highest degree first.
fn gen_poly(parity_len: usize) -> Vec<u8> {
    let t = gf_tables();
    (0..parity_len).fold(vec![1u8], |g, i| poly_mul(&g, &[1, t.exp[i]]))
}

/// Check that a parity length leaves room for at least one data byte.
pub fn validate_parity(parity_len: usize) -> Result<(), CodecError> {
    if (2..N_MAX).contains(&parity_len) {
        Ok(())
    } else {
        Err(CodecError::InvalidParity(parity_len))
    }
}

// --- Encoding ---

fn encode_block(data: &[u8], gpoly: &[u8], parity_len: usize) -> Vec<u8> {
    let mut shift_reg = vec![0u8; parity_len];
    for &byte in data {
        let feedback = byte ^ shift_reg[0];
        for j in 0..parity_len - 1 {
            shift_reg[j] = shift_reg[j + 1] ^ gf_mul(feedback, gpoly[j + 1]);
        }
        shift_reg[parity_len - 1] = gf_mul(feedback, gpoly[parity_len]);
    }

    let mut encoded = Vec::with_capacity(data.len() + parity_len);
    encoded.extend_from_slice(data);
    encoded.extend_from_slice(&shift_reg);
    encoded
}

/// RS-encode a payload of any length, splitting it into `255 - parity_len` byte blocks.
///
/// Each block carries `min(remaining, 255 - parity_len) + parity_len` bytes.
/// An empty payload encodes to an empty vector.
pub fn encode(payload: &[u8], parity_len: usize) -> Vec<u8> {
    let gpoly = gen_poly(parity_len);
    let k_max = N_MAX - parity_len;
    let mut encoded = Vec::with_capacity(encoded_len(payload.len(), parity_len));
    for chunk in payload.chunks(k_max) {
        encoded.extend_from_slice(&encode_block(chunk, &gpoly, parity_len));
    }
    encoded
}

/// RS-encoded length for a payload of `data_len` bytes.
pub fn encoded_len(data_len: usize, parity_len: usize) -> usize {
    let k_max = N_MAX - parity_len;
    data_len.div_ceil(k_max) * parity_len + data_len
}

// --- Decoding ---

/// Returns sigma(x) in ascending power: sigma[0]=1, sigma[1]=σ_1, ...
fn berlekamp_massey(syndromes: &[u8]) -> Vec<u8> {
    let n = syndromes.len();

    let mut c = vec![0u8; n + 1];
    c[0] = 1;
    let mut c_len = 1usize;

    let mut b = vec![0u8; n + 1];
    b[0] = 1;
    let mut b_len = 1usize;

    let mut ell = 0usize;
    let mut bval = 1u8;
    let mut m = 1usize;

    for r in 0..n {
        let mut delta = syndromes[r];
        for i in 1..c_len {
            delta ^= gf_mul(c[i], syndromes[r - i]);
        }

        if delta == 0 {
            m += 1;
            continue;
        }

        let factor = gf_mul(delta, gf_inv(bval));
        let old_c = c.clone();
        let old_c_len = c_len;

        c_len = (b_len + m).max(c_len);
        for j in 0..b_len {
            if j + m <= n {
                c[j + m] ^= gf_mul(factor, b[j]);
            }
        }

        if 2 * ell <= r {
            b[..old_c_len].copy_from_slice(&old_c[..old_c_len]);
            b[old_c_len..].fill(0);
            b_len = old_c_len;
            ell = r + 1 - ell;
            bval = delta;
            m = 1;
        } else {
            m += 1;
        }
    }

    c.truncate(c_len.min(n + 1));
    c
}

/// Chien search over a full 255-symbol block. Returns (gf_pos, array_pos) pairs.
fn chien_search(sigma_asc: &[u8]) -> Option<Vec<(usize, usize)>> {
    let tab = gf_tables();
    let num_errors = sigma_asc.len() - 1;
    let mut found = Vec::with_capacity(num_errors);

    for p in 0..N_MAX {
        let x = if p == 0 { 1u8 } else { tab.exp[255 - p] };
        if eval_asc(sigma_asc, x) == 0 {
            found.push((p, N_MAX - 1 - p));
        }
    }

    (found.len() == num_errors).then_some(found)
}

/// Forney algorithm (FCR=0): e_l = X_l * Omega(X_l^{-1}) / Sigma'(X_l^{-1}).
fn forney(sigma_asc: &[u8], syndromes: &[u8], found: &[(usize, usize)]) -> Vec<u8> {
    let tab = gf_tables();
    let two_t = syndromes.len();

    let mut omega = vec![0u8; two_t];
    for (i, &s) in sigma_asc.iter().enumerate().take(two_t) {
        for j in 0..two_t - i {
            omega[i + j] ^= gf_mul(s, syndromes[j]);
        }
    }

    // Even-power terms vanish in the formal derivative over GF(2^m).
    let mut sigma_prime = vec![0u8; sigma_asc.len().saturating_sub(1)];
    for i in (1..sigma_asc.len()).step_by(2) {
        sigma_prime[i - 1] = sigma_asc[i];
    }

    found
        .iter()
        .map(|&(gf_pos, _)| {
            let x_val = tab.exp[gf_pos % 255];
            let x_inv = tab.exp[(255 - gf_pos % 255) % 255];
            let sp_val = eval_asc(&sigma_prime, x_inv);
            if sp_val == 0 {
                0
            } else {
                gf_mul(x_val, gf_mul(eval_asc(&omega, x_inv), gf_inv(sp_val)))
            }
        })
        .collect()
}

fn syndromes_of(block: &[u8], parity_len: usize) -> Vec<u8> {
    let tab = gf_tables();
    (0..parity_len).map(|i| poly_eval(block, tab.exp[i])).collect()
}

/// Decode one block of `data_len + parity_len` bytes. Returns (data, errors corrected).
fn decode_block(received: &[u8], parity_len: usize) -> Option<(Vec<u8>, usize)> {
    let data_len = received.len() - parity_len;
    let padding = N_MAX - received.len();
    let mut full_block = vec![0u8; N_MAX];
    full_block[padding..].copy_from_slice(received);

    let syndromes = syndromes_of(&full_block, parity_len);
    if syndromes.iter().all(|&s| s == 0) {
        return Some((received[..data_len].to_vec(), 0));
    }

    let sigma_asc = berlekamp_massey(&syndromes);
    let num_errors = sigma_asc.len() - 1;
    if num_errors == 0 || num_errors > parity_len / 2 {
        return None;
    }

    let found = chien_search(&sigma_asc)?;
    let magnitudes = forney(&sigma_asc, &syndromes, &found);

    for (&(_, array_pos), &magnitude) in found.iter().zip(&magnitudes) {
        // An error in the virtual zero padding means the block is beyond repair.
        if array_pos < padding {
            return None;
        }
        full_block[array_pos] ^= magnitude;
    }

    if syndromes_of(&full_block, parity_len).iter().any(|&s| s != 0) {
        return None;
    }

    Some((full_block[padding..padding + data_len].to_vec(), num_errors))
}

/// Statistics from decoding all blocks of one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Total symbol errors corrected across all blocks.
    pub corrected: usize,
    /// Number of RS blocks decoded.
    pub blocks: usize,
}

/// RS-decode a payload produced by [`encode`] with the same parity length.
///
/// Blocks are 255 bytes except the last, whose data length is whatever
/// remains after stripping its parity.
///
/// # Errors
/// [`CodecError::Uncorrectable`] if any block has more than `parity_len / 2`
/// symbol errors or is shorter than the parity itself.
pub fn decode(encoded: &[u8], parity_len: usize) -> Result<(Vec<u8>, DecodeStats), CodecError> {
    let mut decoded = Vec::with_capacity(encoded.len());
    let mut stats = DecodeStats::default();

    for (block_idx, block) in encoded.chunks(N_MAX).enumerate() {
        if block.len() < parity_len {
            return Err(CodecError::Uncorrectable { block: block_idx });
        }
        let (data, errors) = decode_block(block, parity_len)
            .ok_or(CodecError::Uncorrectable { block: block_idx })?;
        decoded.extend_from_slice(&data);
        stats.corrected += errors;
        stats.blocks += 1;
    }

    Ok((decoded, stats))
}
