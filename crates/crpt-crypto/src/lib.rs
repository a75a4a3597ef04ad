//! crpt-crypto: password-based file encryption
//!
//! Cipher: 64-bit blocks, 128-bit key, 8 rounds plus an output transform
//! (IDEA construction), applied block by block with no chaining.
//!
//! Pipeline: plaintext → MD5 checksum → zero-pad to 8 bytes → encipher blocks → container
//!
//! Key material:
//! ```text
//! Password
//!   └── Master Key (128-bit, MD5(SHA-256(password)))
//!         ├── Round keys: 9 × 6 forward subkeys + 9 × 6 inverse subkeys
//!         └── Verification tag: SHA-256(master key), stored in every header
//! ```

pub mod arith;
pub mod block;
pub mod context;
pub mod digest;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod names;
pub mod parallel;
pub mod schedule;

pub use context::CipherContext;
pub use envelope::{
    decrypt_file, decrypt_file_with, encrypt_file, encrypt_file_with, read_header,
    CorruptionPolicy, EnvelopeHeader, StreamOptions,
};
pub use error::{CryptError, CryptResult};
pub use kdf::{derive_key, derive_verification_tag, MasterKey};
pub use names::{decrypt_name, encrypt_name, visible_digest, visible_name};
pub use parallel::process_blocks;
pub use schedule::{Mode, RoundKeySet};

/// Size of a master key in bytes (128-bit)
pub const KEY_SIZE: usize = 16;

/// Size of a cipher block in bytes
pub const BLOCK_SIZE: usize = block::BLOCK_SIZE;

/// File extension appended to encrypted outputs
pub const ENCRYPTED_EXTENSION: &str = "crpt";
