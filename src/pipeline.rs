// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compression and a homebrew obfuscation cipher applied to a file's bytes
//! before they are framed.
//!
//! The cipher here is a password-derived XOR keystream. It is **not**
//! authenticated encryption: it offers obfuscation against a casual
//! observer, not confidentiality against an adversary who can tamper with
//! the stream. It exists only for wire-compatibility with the format this
//! crate implements; do not rely on it to keep anything secret.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Compresses `data` at maximum level. If the compressed form is not
/// strictly smaller, returns the original bytes and `false`.
pub fn compress(data: &[u8]) -> Result<(Vec<u8>, bool)> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).context("failed to compress payload")?;
    let compressed = encoder.finish().context("failed to finalize compression")?;

    if compressed.len() < data.len() {
        Ok((compressed, true))
    } else {
        Ok((data.to_vec(), false))
    }
}

/// Reverses `compress`. If `is_compressed` is false, returns `data` unchanged.
pub fn decompress(data: &[u8], is_compressed: bool) -> Result<Vec<u8>> {
    if !is_compressed {
        return Ok(data.to_vec());
    }
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .context("decompression failed (wrong password, or corrupted stream)")?;
    Ok(out)
}

/// Generates a 16-byte salt: the first 16 bytes of SHA-256 over 32 random bytes.
#[must_use]
pub fn generate_salt() -> [u8; 16] {
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    let digest = Sha256::digest(entropy);
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&digest[..16]);
    salt
}

/// Derives `length` bytes of keystream from `password` and `salt` by
/// concatenating `SHA-256(BE32(block) || password_utf8 || salt)` for
/// `block = 0, 1, 2, ...` and truncating.
///
/// This is a homebrew KDF, not a vetted one (no work factor, no
/// side-channel hardening). It is kept only for wire-compatibility.
#[must_use]
pub fn derive_key(password: &str, salt: &[u8; 16], length: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(length + 32);
    let mut block: u32 = 0;
    while key.len() < length {
        let mut hasher = Sha256::new();
        hasher.update(block.to_be_bytes());
        hasher.update(password.as_bytes());
        hasher.update(salt);
        key.extend_from_slice(&hasher.finalize());
        block += 1;
    }
    key.truncate(length);
    key
}

/// XORs `data` against `key`, repeating `key` as needed. Symmetric: the
/// same call encrypts and decrypts.
#[must_use]
pub fn xor_crypt(data: &[u8], key: &[u8]) -> Vec<u8> {
    assert!(!key.is_empty(), "xor_crypt requires a non-empty key");
    data.iter()
        .enumerate()
        .map(|(i, &b)| b ^ key[i % key.len()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_decompress_round_trips() {
        let data = vec![0u8; 1024 * 1024];
        let (compressed, flagged) = compress(&data).unwrap();
        assert!(flagged);
        assert!(compressed.len() < data.len());
        let out = decompress(&compressed, true).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn incompressible_data_keeps_flag_clear() {
        // Already-compressed-looking random bytes shouldn't shrink further.
        let mut data = vec![0u8; 256];
        for (i, b) in data.iter_mut().enumerate() {
            *b = ((i * 2654435761) % 256) as u8;
        }
        let (out, flagged) = compress(&data).unwrap();
        if !flagged {
            assert_eq!(out, data);
        }
    }

    #[test]
    fn xor_crypt_is_its_own_inverse() {
        let data = b"hello world\n".to_vec();
        let key = derive_key("pw", &[1u8; 16], data.len());
        let enc = xor_crypt(&data, &key);
        let dec = xor_crypt(&enc, &key);
        assert_eq!(dec, data);
    }

    #[test]
    fn wrong_password_produces_different_keystream() {
        let salt = [2u8; 16];
        let a = derive_key("pw", &salt, 64);
        let b = derive_key("PW", &salt, 64);
        assert_ne!(a, b);
    }

    #[test]
    fn derive_key_is_deterministic_for_same_inputs() {
        let salt = [3u8; 16];
        let a = derive_key("correct horse", &salt, 300);
        let b = derive_key("correct horse", &salt, 300);
        assert_eq!(a, b);
        assert_eq!(a.len(), 300);
    }
}
