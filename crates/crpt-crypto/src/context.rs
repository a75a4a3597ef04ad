//! Session key material: everything derived from one password

use secrecy::SecretString;

use crate::digest::Digest256;
use crate::kdf::{derive_key, derive_verification_tag, MasterKey};
use crate::schedule::RoundKeySet;

/// Master key, expanded subkeys, and verification tag for one password.
///
/// Built once per session and passed by reference to every envelope and
/// name operation. Several contexts may coexist (one per key).
#[derive(Debug, Clone)]
pub struct CipherContext {
    key: MasterKey,
    keys: RoundKeySet,
    tag: Digest256,
}

impl CipherContext {
    pub fn from_password(password: &SecretString) -> Self {
        Self::from_key(derive_key(password))
    }

    pub fn from_key(key: MasterKey) -> Self {
        let keys = RoundKeySet::new(&key);
        let tag = derive_verification_tag(&key);
        Self { key, keys, tag }
    }

    pub fn master_key(&self) -> &MasterKey {
        &self.key
    }

    pub fn round_keys(&self) -> &RoundKeySet {
        &self.keys
    }

    pub fn verification_tag(&self) -> &Digest256 {
        &self.tag
    }

    /// Whether a stored tag was produced by this context's key
    pub fn matches_tag(&self, stored: &Digest256) -> bool {
        // Fold over every byte instead of short-circuiting on the first difference
        self.tag
            .iter()
            .zip(stored.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
