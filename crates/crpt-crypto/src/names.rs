//! File name encryption with an embedded checksum
//!
//! Encrypted name format (binary):
//! ```text
//! [16 bytes: MD5 of the name][8-byte blocks: enciphered name, zero-padded]
//! ```
//!
//! Decryption truncates at the first zero byte and recomputes the MD5; a
//! mismatch means the payload was altered or the key is wrong.
//!
//! Names are raw bytes: whatever the platform stores, without re-encoding.

use crate::block::{process_bytes, BLOCK_SIZE};
use crate::digest::{digest128, Digest128};
use crate::error::{CryptError, CryptResult};
use crate::schedule::{Mode, RoundKeySet};

/// Size of the checksum prefix
pub const NAME_DIGEST_SIZE: usize = 16;

/// Length of the encrypted form of a `name_len`-byte name
pub fn encrypted_name_len(name_len: usize) -> usize {
    NAME_DIGEST_SIZE + name_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Encrypt a name: checksum prefix followed by one block per 8-byte chunk.
pub fn encrypt_name(keys: &RoundKeySet, name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encrypted_name_len(name.len()));
    out.extend_from_slice(&digest128(name));

    for chunk in name.chunks(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);
        process_bytes(&mut block, keys, Mode::Encrypt);
        out.extend_from_slice(&block);
    }
    out
}

/// Checksum-only form of a name, for one-way use.
pub fn name_digest(name: &[u8]) -> Digest128 {
    digest128(name)
}

/// Render the name checksum as eight 4-digit hex words.
///
/// Words are read little-endian, so the text differs from the usual MD5 hex
/// string by a byte swap within each pair.
pub fn visible_digest(name: &[u8]) -> String {
    name_digest(name)
        .chunks_exact(2)
        .map(|pair| format!("{:04x}", u16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

/// One-way output file name: the visible digest plus the encrypted extension.
pub fn visible_name(name: &[u8]) -> String {
    format!("{}.{}", visible_digest(name), crate::ENCRYPTED_EXTENSION)
}

/// Decrypt a name produced by [`encrypt_name`] and verify its checksum.
pub fn decrypt_name(keys: &RoundKeySet, payload: &[u8]) -> CryptResult<Vec<u8>> {
    if payload.len() < NAME_DIGEST_SIZE || (payload.len() - NAME_DIGEST_SIZE) % BLOCK_SIZE != 0 {
        return Err(CryptError::Format(format!(
            "encrypted name of {} bytes",
            payload.len()
        )));
    }

    let (stored, blocks) = payload.split_at(NAME_DIGEST_SIZE);
    let mut plain = Vec::with_capacity(blocks.len());
    for chunk in blocks.chunks_exact(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        process_bytes(&mut block, keys, Mode::Decrypt);
        plain.extend_from_slice(&block);
    }

    if let Some(end) = plain.iter().position(|&b| b == 0) {
        plain.truncate(end);
    }

    if digest128(&plain)[..] != *stored {
        return Err(CryptError::Integrity {
            what: "encrypted name".into(),
            kept: false,
        });
    }

    Ok(plain)
}
