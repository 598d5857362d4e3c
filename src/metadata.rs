// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The self-describing, CRC-protected metadata record that occupies the
//! second frame of every FileVault stream.

use crate::constants::{MAGIC, MAX_ORIGINAL_SIZE, VERSION};

/// Bit flag: payload was deflate-compressed.
pub const FLAG_COMPRESSED: u8 = 0x01;

/// Bit flag: payload was XOR-obfuscated with a password-derived keystream.
pub const FLAG_ENCRYPTED: u8 = 0x02;

/// The parsed metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Record format version the file was encoded with.
    pub version: u8,
    /// Side length of a square data block, in pixels.
    pub block_size: u8,
    /// Bits per channel, `2` or `3`.
    pub bpc: u8,
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// Informational output framerate.
    pub fps: u8,
    /// Data-frame repetition count, at least 1.
    pub repeat: u8,
    /// True if the payload was deflate-compressed.
    pub compressed: bool,
    /// True if the payload was XOR-obfuscated.
    pub encrypted: bool,
    /// Original file name, as given on encode.
    pub filename: String,
    /// Uncompressed, unencrypted plaintext length.
    pub original_size: u64,
    /// Length of the payload actually framed (post compress/encrypt).
    pub payload_size: u64,
    /// SHA-256 of the plaintext.
    pub file_hash: [u8; 32],
    /// Salt used to derive the encryption keystream; zero-filled if unencrypted.
    pub salt: [u8; 16],
}

/// Parameters needed to build a new metadata record.
pub struct BuildParams<'a> {
    /// Side length of a square data block, in pixels.
    pub block_size: u8,
    /// Bits per channel, `2` or `3`.
    pub bpc: u8,
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// Informational output framerate.
    pub fps: u8,
    /// Data-frame repetition count.
    pub repeat: u8,
    /// Original file name.
    pub filename: &'a str,
    /// Uncompressed, unencrypted plaintext length.
    pub original_size: u64,
    /// Length of the payload actually framed.
    pub payload_size: u64,
    /// SHA-256 of the plaintext.
    pub file_hash: [u8; 32],
    /// True if the payload was deflate-compressed.
    pub compressed: bool,
    /// True if the payload was XOR-obfuscated.
    pub encrypted: bool,
    /// Salt used to derive the encryption keystream; ignored if not encrypted.
    pub salt: [u8; 16],
}

/// Builds the on-disk record bytes, zero-padded to `frame_capacity`.
///
/// # Panics
/// Panics if `params.filename` is longer than 255 UTF-8 bytes, or if the
/// record (before padding) does not fit within `frame_capacity`.
#[must_use]
pub fn build(params: &BuildParams<'_>, frame_capacity: usize) -> Vec<u8> {
    let name_bytes = params.filename.as_bytes();
    assert!(name_bytes.len() <= 255, "filename too long for name_len field");

    let mut m = Vec::with_capacity(frame_capacity);
    m.extend_from_slice(&MAGIC);
    m.push(VERSION);
    m.push(params.block_size);
    m.push(params.bpc);
    m.extend_from_slice(&params.width.to_be_bytes());
    m.extend_from_slice(&params.height.to_be_bytes());
    m.push(params.fps);
    m.push(params.repeat);

    let mut flags = 0u8;
    if params.compressed {
        flags |= FLAG_COMPRESSED;
    }
    if params.encrypted {
        flags |= FLAG_ENCRYPTED;
    }
    m.push(flags);

    #[allow(clippy::cast_possible_truncation)]
    m.push(name_bytes.len() as u8);
    m.extend_from_slice(name_bytes);

    m.extend_from_slice(&params.original_size.to_be_bytes());
    m.extend_from_slice(&params.payload_size.to_be_bytes());
    m.extend_from_slice(&params.file_hash);

    if params.encrypted {
        m.extend_from_slice(&params.salt);
    } else {
        m.extend_from_slice(&[0u8; 16]);
    }

    let crc = crc32fast::hash(&m);
    m.extend_from_slice(&crc.to_be_bytes());

    assert!(m.len() <= frame_capacity, "metadata record overflows one frame");
    m.resize(frame_capacity, 0);
    m
}

/// Parses a metadata record out of `data`. Returns `None` ("no metadata")
/// if the magic doesn't match, a length prefix runs off the buffer, CRC
/// fails, or `original_size` is zero or exceeds `MAX_ORIGINAL_SIZE`.
///
/// On `version < 3`, `repeat`, `flags`, `payload_size`, and `salt` take
/// their legacy defaults: `1`, `0`, `original_size`, and all-zero.
#[must_use]
pub fn parse(data: &[u8]) -> Option<Metadata> {
    if data.len() < 4 || data[0..4] != MAGIC {
        return None;
    }

    let mut p = 4usize;
    let version = *data.get(p)?;
    p += 1;
    let block_size = *data.get(p)?;
    p += 1;
    let bpc = *data.get(p)?;
    p += 1;
    let width = u16::from_be_bytes(data.get(p..p + 2)?.try_into().ok()?);
    p += 2;
    let height = u16::from_be_bytes(data.get(p..p + 2)?.try_into().ok()?);
    p += 2;
    let fps = *data.get(p)?;
    p += 1;

    let (repeat, compressed, encrypted) = if version >= 3 {
        let repeat = *data.get(p)?;
        p += 1;
        let flags = *data.get(p)?;
        p += 1;
        (repeat, flags & FLAG_COMPRESSED != 0, flags & FLAG_ENCRYPTED != 0)
    } else {
        (1u8, false, false)
    };

    let name_len = *data.get(p)? as usize;
    p += 1;
    if name_len == 0 {
        return None;
    }
    let name_bytes = data.get(p..p + name_len)?;
    let filename = std::str::from_utf8(name_bytes).ok()?.to_string();
    p += name_len;

    let original_size = u64::from_be_bytes(data.get(p..p + 8)?.try_into().ok()?);
    p += 8;

    let payload_size = if version >= 3 {
        let v = u64::from_be_bytes(data.get(p..p + 8)?.try_into().ok()?);
        p += 8;
        v
    } else {
        original_size
    };

    let file_hash: [u8; 32] = data.get(p..p + 32)?.try_into().ok()?;
    p += 32;

    let salt: [u8; 16] = if version >= 3 {
        let s: [u8; 16] = data.get(p..p + 16)?.try_into().ok()?;
        p += 16;
        s
    } else {
        [0u8; 16]
    };

    let stored_crc = u32::from_be_bytes(data.get(p..p + 4)?.try_into().ok()?);
    p += 4;

    let record_before_crc = &data[..p - 4];
    if crc32fast::hash(record_before_crc) != stored_crc {
        return None;
    }

    if original_size == 0 || original_size > MAX_ORIGINAL_SIZE {
        return None;
    }

    Some(Metadata {
        version,
        block_size,
        bpc,
        width,
        height,
        fps,
        repeat,
        compressed,
        encrypted,
        filename,
        original_size,
        payload_size,
        file_hash,
        salt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params(filename: &'static str) -> BuildParams<'static> {
        BuildParams {
            block_size: 8,
            bpc: 2,
            width: 640,
            height: 480,
            fps: 10,
            repeat: 1,
            filename,
            original_size: 12,
            payload_size: 12,
            file_hash: [7u8; 32],
            compressed: false,
            encrypted: false,
            salt: [0u8; 16],
        }
    }

    #[test]
    fn build_then_parse_round_trips() {
        let params = sample_params("hello.txt");
        let record = build(&params, 4096);
        let parsed = parse(&record).expect("should parse");
        assert_eq!(parsed.version, VERSION);
        assert_eq!(parsed.block_size, 8);
        assert_eq!(parsed.bpc, 2);
        assert_eq!(parsed.width, 640);
        assert_eq!(parsed.height, 480);
        assert_eq!(parsed.filename, "hello.txt");
        assert_eq!(parsed.original_size, 12);
        assert_eq!(parsed.payload_size, 12);
        assert!(!parsed.compressed);
        assert!(!parsed.encrypted);
    }

    #[test]
    fn encrypted_flag_and_salt_survive_round_trip() {
        let mut params = sample_params("secret.bin");
        params.encrypted = true;
        params.salt = [9u8; 16];
        let record = build(&params, 4096);
        let parsed = parse(&record).expect("should parse");
        assert!(parsed.encrypted);
        assert_eq!(parsed.salt, [9u8; 16]);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let params = sample_params("x");
        let mut record = build(&params, 4096);
        record[0] = b'X';
        assert!(parse(&record).is_none());
    }

    #[test]
    fn single_byte_mutation_fails_crc() {
        let params = sample_params("hello.txt");
        let record = build(&params, 4096);
        // Mutate every byte of the record up to (not including) the CRC
        // field itself and require rejection each time.
        let unpadded_len = MAGIC.len()
            + 1 // version
            + 1 // block_size
            + 1 // bpc
            + 2 // width
            + 2 // height
            + 1 // fps
            + 1 // repeat
            + 1 // flags
            + 1 // name_len
            + "hello.txt".len()
            + 8 // original_size
            + 8 // payload_size
            + 32 // file_hash
            + 16 // salt
            + 4; // crc
        for i in 0..unpadded_len - 4 {
            let mut mutated = record.clone();
            mutated[i] ^= 0xFF;
            assert!(parse(&mutated).is_none(), "mutation at byte {i} should fail CRC");
        }
    }

    #[test]
    fn zero_original_size_is_rejected() {
        let mut params = sample_params("x");
        params.original_size = 0;
        let record = build(&params, 4096);
        assert!(parse(&record).is_none());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let params = sample_params("hello.txt");
        let record = build(&params, 4096);
        assert!(parse(&record[..10]).is_none());
    }
}
