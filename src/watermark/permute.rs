// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Payload bit permutation for `random_bit_assignment`.
//!
//! A Fisher-Yates shuffle driven by a ChaCha20 PRNG. Embedder and detector
//! reproduce the same order only when they share the seed.
//!
//! # Cross-platform portability
//!
//! The shuffle draws `u32` ranges (not `usize`) so a seed yields the same
//! permutation on 32-bit and 64-bit targets.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Permutation of `0..len`: output position `i` takes input bit `order[i]`.
pub fn permutation(len: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    for i in (1..len).rev() {
        let j = rng.gen_range(0..=(i as u32)) as usize;
        order.swap(i, j);
    }
    order
}

/// Reorder bits by `order`.
pub fn apply(bits: &[u8], order: &[usize]) -> Vec<u8> {
    order.iter().map(|&src| bits[src]).collect()
}

/// Undo [`apply`].
pub fn invert(bits: &[u8], order: &[usize]) -> Vec<u8> {
    let mut restored = vec![0u8; bits.len()];
    for (&bit, &src) in bits.iter().zip(order) {
        restored[src] = bit;
    }
    restored
}

/// Fresh seed for embed-only permutations.
pub fn random_seed() -> u64 {
    rand::thread_rng().gen()
}
