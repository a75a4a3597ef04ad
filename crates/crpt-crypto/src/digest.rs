//! Digest primitives: MD5 (128-bit) for content checksums, SHA-256 for key material

use std::io::{ErrorKind, Read};

use md5::{Digest, Md5};
use sha2::Sha256;

/// 128-bit content digest
pub type Digest128 = [u8; 16];

/// 256-bit digest
pub type Digest256 = [u8; 32];

pub fn digest128(data: &[u8]) -> Digest128 {
    Md5::digest(data).into()
}

pub fn digest256(data: &[u8]) -> Digest256 {
    Sha256::digest(data).into()
}

/// Streaming 128-bit digest of everything readable from `reader`, and the
/// number of bytes it covered.
pub fn digest128_reader<R: Read>(mut reader: R) -> std::io::Result<(Digest128, u64)> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut len = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        len += n as u64;
    }

    Ok((hasher.finalize().into(), len))
}

/// Lowercase hex rendering of a digest
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
