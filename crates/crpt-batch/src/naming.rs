//! Output paths for each direction
//!
//! Encrypt: `<path>.crpt`, or `<dir>/<visible name>.crpt` when names are hidden.
//! Decrypt: `<dir>/<stored name>`; when the stored name cannot be recovered,
//! strip `.crpt`, else prefix `~DCPT-` to the base name.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crpt_crypto::{read_header, visible_name, CipherContext, CryptError, CryptResult, ENCRYPTED_EXTENSION};
use tracing::warn;

/// Prefix for decrypted outputs whose name could not be recovered
pub const FALLBACK_PREFIX: &str = "~DCPT-";

pub fn encrypted_output(source: &Path, hide_names: bool) -> PathBuf {
    if hide_names {
        return source.with_file_name(visible_name(source.as_os_str().as_encoded_bytes()));
    }
    let mut name = OsString::from(source.as_os_str());
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

/// Resolve the output path for decrypting `source`.
///
/// Fails when the header cannot be read or was written with another key.
pub fn decrypted_output(ctx: &CipherContext, source: &Path) -> CryptResult<PathBuf> {
    let header = read_header(source)?;

    match header.original_name(ctx) {
        Ok(name) if is_plain_file_name(&name) => Ok(source.with_file_name(name)),
        Ok(name) => {
            warn!(
                source = %source.display(),
                name = %name.to_string_lossy(),
                "stored name is not a plain file name"
            );
            Ok(fallback_output(source))
        }
        Err(e @ CryptError::KeyMismatch { .. }) => Err(e),
        Err(e) => {
            warn!(source = %source.display(), "unable to recover stored name: {e}");
            Ok(fallback_output(source))
        }
    }
}

/// Decrypted output path when no stored name is available
pub fn fallback_output(source: &Path) -> PathBuf {
    if source
        .extension()
        .is_some_and(|ext| ext == ENCRYPTED_EXTENSION)
    {
        return source.with_extension("");
    }

    let mut name = OsString::from(FALLBACK_PREFIX);
    if let Some(base) = source.file_name() {
        name.push(base);
    }
    source.with_file_name(name)
}

fn is_plain_file_name(name: &OsStr) -> bool {
    let bytes = name.as_encoded_bytes();
    !bytes.is_empty()
        && bytes != b"."
        && bytes != b".."
        && !bytes.iter().any(|&b| matches!(b, b'/' | b'\\' | 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crpt_crypto::{encrypt_file, MasterKey};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn ctx() -> CipherContext {
        CipherContext::from_key(MasterKey::from_words([3, 1, 4, 1, 5, 9, 2, 6]))
    }

    #[test]
    fn test_encrypted_output_appends_extension() {
        assert_eq!(
            encrypted_output(Path::new("dir/report.pdf"), false),
            Path::new("dir/report.pdf.crpt")
        );
    }

    #[test]
    fn test_hidden_name_uses_full_path_digest() {
        let out = encrypted_output(Path::new("dir/report.pdf"), true);

        assert_eq!(out.parent(), Some(Path::new("dir")));
        assert_eq!(
            out.file_name().unwrap().to_str().unwrap(),
            visible_name(b"dir/report.pdf")
        );
        assert_ne!(out, encrypted_output(Path::new("other/report.pdf"), true));
    }

    #[test]
    fn test_fallback_strips_extension() {
        assert_eq!(
            fallback_output(Path::new("dir/a.txt.crpt")),
            Path::new("dir/a.txt")
        );
    }

    #[test]
    fn test_fallback_prefixes_name() {
        assert_eq!(
            fallback_output(Path::new("dir/blob.bin")),
            Path::new("dir/~DCPT-blob.bin")
        );
    }

    #[test]
    fn test_decrypted_output_uses_stored_name() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("notes.txt");
        std::fs::write(&src, b"remember the milk").unwrap();

        let enc = encrypted_output(&src, true);
        encrypt_file(&ctx(), &src, &enc).unwrap();

        assert_eq!(decrypted_output(&ctx(), &enc).unwrap(), src);
    }

    #[test]
    fn test_decrypted_output_wrong_key() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("notes.txt");
        std::fs::write(&src, b"x").unwrap();
        let enc = encrypted_output(&src, false);
        encrypt_file(&ctx(), &src, &enc).unwrap();

        let other = CipherContext::from_key(MasterKey::from_words([0; 8]));
        let err = decrypted_output(&other, &enc).unwrap_err();
        assert!(matches!(err, CryptError::KeyMismatch { .. }));
    }

    #[test]
    fn test_damaged_stored_name_falls_back() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("notes.txt");
        std::fs::write(&src, b"some content").unwrap();
        let enc = encrypted_output(&src, false);
        encrypt_file(&ctx(), &src, &enc).unwrap();

        // First byte of the stored name checksum
        let mut raw = std::fs::read(&enc).unwrap();
        raw[51] ^= 0xFF;
        std::fs::write(&enc, &raw).unwrap();

        assert_eq!(decrypted_output(&ctx(), &enc).unwrap(), src);

        let renamed = tmp.path().join("renamed.bin");
        std::fs::rename(&enc, &renamed).unwrap();
        assert_eq!(
            decrypted_output(&ctx(), &renamed).unwrap(),
            tmp.path().join("~DCPT-renamed.bin")
        );
    }

    #[test]
    fn test_unsafe_names_rejected() {
        let plain = |s: &str| is_plain_file_name(OsStr::new(s));
        assert!(plain("a.txt"));
        assert!(!plain(""));
        assert!(!plain(".."));
        assert!(!plain("../etc/passwd"));
        assert!(!plain("a\\b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_roundtrip() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let latin = OsStr::from_bytes(b"r\xe9sum\xe9.txt");
        let src = tmp.path().join(latin);
        std::fs::write(&src, b"cv").unwrap();

        for hide in [false, true] {
            let enc = encrypted_output(&src, hide);
            encrypt_file(&ctx(), &src, &enc).unwrap();
            assert_eq!(decrypted_output(&ctx(), &enc).unwrap(), src);
        }

        // Hidden names digest the raw bytes, not a lossy rendering
        let lossy = tmp.path().join(latin.to_string_lossy().as_ref());
        assert_ne!(encrypted_output(&src, true), encrypted_output(&lossy, true));
    }

    proptest! {
        #[test]
        fn encrypted_output_stays_in_place(name in "[a-z]{1,12}(\\.[a-z]{1,4})?") {
            let source = Path::new("base").join(&name);
            let out = encrypted_output(&source, false);

            prop_assert_eq!(out.parent(), source.parent());
            prop_assert_eq!(out.extension().and_then(|e| e.to_str()), Some("crpt"));
            prop_assert_eq!(fallback_output(&out), source);
        }
    }
}
