// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Authenticated encryption of watermark bit strings.
//!
//! A bit string is packed into bytes and sealed with AES-256-GCM-SIV. The
//! sealed form is laid out as
//!
//! ```text
//! [12 bytes] nonce
//! [16 bytes] authentication tag
//! [N bytes ] ciphertext of (pad-bit count || packed bits)
//! ```
//!
//! and expanded back into bits (8 per byte). The leading pad-bit count lets
//! decryption restore bit strings whose length is not a multiple of 8.
//!
//! The cipher key is the role secret truncated or right-padded with `b'0'` to
//! 32 bytes. This is not a key-derivation function: short secrets make weak
//! keys. It is kept because embedder and detector must agree on the key from
//! the secret alone.
//!
//! AES-GCM-SIV is nonce-misuse resistant, which is what allows
//! [`derive_nonce`] to produce a fixed nonce per secret and keep encrypted
//! payloads deterministic.

use aes_gcm_siv::aead::Aead;
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use argon2::Argon2;
use zeroize::Zeroizing;

use super::bits::{bits_to_bytes, bytes_to_bits};
use super::error::CodecError;

/// AES-GCM-SIV nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// AES-GCM-SIV authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// Filler byte used to right-pad short secrets.
pub const KEY_FILLER: u8 = b'0';

/// Fixed salt for the deterministic payload nonce.
const NONCE_SALT: &[u8; 16] = b"codemark-nonce-1";

/// Key material for one role, wiped from memory on drop.
pub struct CipherKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
    secret: Zeroizing<Vec<u8>>,
}

impl CipherKey {
    /// Build the cipher key from a role secret (truncate or pad with `b'0'`).
    pub fn from_secret(secret: &str) -> Self {
        let mut bytes = Zeroizing::new([KEY_FILLER; KEY_LEN]);
        let raw = secret.as_bytes();
        let n = raw.len().min(KEY_LEN);
        bytes[..n].copy_from_slice(&raw[..n]);
        Self {
            bytes,
            secret: Zeroizing::new(raw.to_vec()),
        }
    }

    fn cipher(&self) -> Aes256GcmSiv {
        Aes256GcmSiv::new_from_slice(&*self.bytes).expect("valid key length")
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

/// Derive the deterministic payload nonce for a key.
///
/// Argon2id over the full secret with a fixed salt, so the same secret always
/// seals the same payload to the same bits.
pub fn derive_nonce(key: &CipherKey) -> [u8; NONCE_LEN] {
    let mut output = [0u8; NONCE_LEN];
    Argon2::default()
        .hash_password_into(&key.secret, NONCE_SALT, &mut output)
        .expect("Argon2 with a 16-byte salt and 12-byte output should not fail");
    output
}

fn pack(bits: &[u8]) -> Vec<u8> {
    let pad_bits = ((8 - bits.len() % 8) % 8) as u8;
    let mut plaintext = Vec::with_capacity(1 + bits.len().div_ceil(8));
    plaintext.push(pad_bits);
    plaintext.extend_from_slice(&bits_to_bytes(bits));
    plaintext
}

/// Encrypt a bit string with a random nonce.
pub fn encrypt(bits: &[u8], key: &CipherKey) -> Vec<u8> {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    encrypt_with(bits, key, &nonce)
}

/// Encrypt a bit string with a caller-provided nonce.
///
/// Returns the bits of `nonce || tag || ciphertext`.
pub fn encrypt_with(bits: &[u8], key: &CipherKey, nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let sealed = key
        .cipher()
        .encrypt(Nonce::from_slice(nonce), pack(bits).as_slice())
        .expect("AES-GCM-SIV encrypt should not fail");
    // The aead crate appends the tag; move it in front of the ciphertext.
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
    combined.extend_from_slice(nonce);
    combined.extend_from_slice(tag);
    combined.extend_from_slice(ciphertext);
    bytes_to_bits(&combined)
}

/// Decrypt a bit string produced by [`encrypt`] or [`encrypt_with`].
///
/// # Errors
/// - [`CodecError::Truncated`] if the input cannot hold a nonce, tag and pad byte.
/// - [`CodecError::Authentication`] on tag mismatch. No plaintext is returned.
pub fn decrypt(bits: &[u8], key: &CipherKey) -> Result<Vec<u8>, CodecError> {
    let combined = bits_to_bytes(bits);
    if combined.len() < NONCE_LEN + TAG_LEN + 1 {
        return Err(CodecError::Truncated(combined.len()));
    }
    let (nonce, rest) = combined.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut sealed = Vec::with_capacity(rest.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext = Zeroizing::new(
        key.cipher()
            .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
            .map_err(|_| CodecError::Authentication)?,
    );

    let pad_bits = plaintext[0] as usize;
    let mut out = bytes_to_bits(&plaintext[1..]);
    if pad_bits > 7 || pad_bits > out.len() {
        return Err(CodecError::Authentication);
    }
    out.truncate(out.len() - pad_bits);
    Ok(out)
}
