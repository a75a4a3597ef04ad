//! Key derivation: password → master key → verification tag
//!
//! ```text
//! master key       = MD5(SHA-256(password))      read as 8 little-endian words
//! verification tag = SHA-256(master key bytes)
//! ```
//!
//! There is no salt and no work factor: the same password always yields the
//! same key, which is what lets any copy of the program open any file.

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::digest::{digest128, digest256, Digest256};
use crate::KEY_SIZE;

/// A 128-bit master key as eight 16-bit words.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    words: [u16; 8],
}

impl MasterKey {
    pub fn from_words(words: [u16; 8]) -> Self {
        Self { words }
    }

    /// Little-endian words from 16 raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        let mut words = [0u16; 8];
        for (w, pair) in words.iter_mut().zip(bytes.chunks_exact(2)) {
            *w = u16::from_le_bytes([pair[0], pair[1]]);
        }
        Self { words }
    }

    pub fn words(&self) -> &[u16; 8] {
        &self.words
    }

    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        let mut bytes = [0u8; KEY_SIZE];
        for (pair, w) in bytes.chunks_exact_mut(2).zip(self.words.iter()) {
            pair.copy_from_slice(&w.to_le_bytes());
        }
        bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.words.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("words", &"[REDACTED]")
            .finish()
    }
}

/// Derive the master key from a password.
pub fn derive_key(password: &SecretString) -> MasterKey {
    let mut stretched = digest256(password.expose_secret().as_bytes());
    let mut bytes = digest128(&stretched);
    stretched.zeroize();

    let key = MasterKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

/// Digest of the raw key bytes, stored in file headers to detect a wrong password.
pub fn derive_verification_tag(key: &MasterKey) -> Digest256 {
    let mut bytes = key.to_bytes();
    let tag = digest256(&bytes);
    bytes.zeroize();
    tag
}
