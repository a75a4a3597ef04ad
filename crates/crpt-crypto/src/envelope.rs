//! Encrypted file container
//!
//! Layout (integers little-endian):
//! ```text
//! [32 bytes: SHA-256 verification tag of the master key]
//! [16 bytes: MD5 of the plaintext]
//! [ 1 byte : padding length, 0..=7]
//! [ 2 bytes: encrypted name length L]
//! [ L bytes: encrypted base name (see `names`)]
//! [8-byte blocks: enciphered plaintext, last block zero-padded]
//! ```
//!
//! Blocks are enciphered independently (codebook style): identical
//! plaintext blocks give identical ciphertext blocks. The MD5 detects
//! corruption after decryption; it does not authenticate the content.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::block::BLOCK_SIZE;
use crate::context::CipherContext;
use crate::digest::{digest128_reader, Digest128, Digest256};
use crate::error::{CryptError, CryptResult};
use crate::names::{decrypt_name, encrypt_name, encrypted_name_len, NAME_DIGEST_SIZE};
use crate::parallel::{process_blocks_with_threshold, DEFAULT_PARALLEL_THRESHOLD};
use crate::schedule::Mode;

/// Bytes before the encrypted name: tag + checksum + padding + name length
pub const HEADER_FIXED_LEN: usize = 32 + 16 + 1 + 2;

/// What to do with decrypted output whose checksum does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionPolicy {
    Keep,
    Discard,
}

/// Streaming parameters
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// I/O buffer size in bytes (rounded up to whole blocks)
    pub buffer_size: usize,
    /// Buffers at least this large are enciphered on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            buffer_size: 256 * 1024,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl StreamOptions {
    fn block_buffer_size(&self) -> usize {
        self.buffer_size.max(BLOCK_SIZE).next_multiple_of(BLOCK_SIZE)
    }
}

/// Parsed container header
#[derive(Debug, Clone)]
pub struct EnvelopeHeader {
    /// File the header was read from
    pub path: PathBuf,
    pub tag: Digest256,
    pub checksum: Digest128,
    pub padding: u8,
    pub encrypted_name: Vec<u8>,
}

impl EnvelopeHeader {
    /// Total header size on disk
    pub fn encoded_len(&self) -> u64 {
        (HEADER_FIXED_LEN + self.encrypted_name.len()) as u64
    }

    /// Decrypt the stored base name.
    ///
    /// Fails with [`CryptError::KeyMismatch`] when `ctx` did not write this file.
    pub fn original_name(&self, ctx: &CipherContext) -> CryptResult<OsString> {
        if !ctx.matches_tag(&self.tag) {
            return Err(CryptError::KeyMismatch {
                path: self.path.clone(),
            });
        }
        let raw = decrypt_name(ctx.round_keys(), &self.encrypted_name)?;
        name_from_bytes(raw)
    }

    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.tag)?;
        w.write_all(&self.checksum)?;
        w.write_all(&[self.padding])?;
        w.write_all(&(self.encrypted_name.len() as u16).to_le_bytes())?;
        w.write_all(&self.encrypted_name)
    }
}

/// Fixed-size part of the header, before the variable-length name
struct FixedHeader {
    tag: Digest256,
    checksum: Digest128,
    padding: u8,
    name_len: usize,
}

/// Padding needed to bring `len` to a whole number of blocks
pub fn padding_for(len: u64) -> u8 {
    ((BLOCK_SIZE as u64 - len % BLOCK_SIZE as u64) % BLOCK_SIZE as u64) as u8
}

/// Read and validate the header of an encrypted file without checking the key.
pub fn read_header(path: &Path) -> CryptResult<EnvelopeHeader> {
    let mut reader = BufReader::new(open_input(path)?);
    let fixed = read_fixed(&mut reader, path)?;
    let encrypted_name = read_name(&mut reader, path, fixed.name_len)?;
    Ok(EnvelopeHeader {
        path: path.to_path_buf(),
        tag: fixed.tag,
        checksum: fixed.checksum,
        padding: fixed.padding,
        encrypted_name,
    })
}

/// Encrypt `input` into `output` with default streaming options.
pub fn encrypt_file(ctx: &CipherContext, input: &Path, output: &Path) -> CryptResult<u64> {
    encrypt_file_with(ctx, input, output, &StreamOptions::default())
}

/// Encrypt `input` into `output`. Returns the plaintext length.
///
/// The length, padding and checksum all come from a single pass over the
/// content; the body is then streamed from exactly that many bytes. Any
/// failure, including input that shrinks in between, removes the partially
/// written output.
pub fn encrypt_file_with(
    ctx: &CipherContext,
    input: &Path,
    output: &Path,
    opts: &StreamOptions,
) -> CryptResult<u64> {
    ensure_distinct(input, output)?;

    let mut file = open_input(input)?;
    let (checksum, len) =
        digest128_reader(BufReader::new(&mut file)).map_err(|e| CryptError::io(input, e))?;
    file.rewind().map_err(|e| CryptError::io(input, e))?;

    let base_name = input
        .file_name()
        .map(|n| n.as_encoded_bytes().to_vec())
        .unwrap_or_default();
    if encrypted_name_len(base_name.len()) > u16::MAX as usize {
        return Err(CryptError::Input(format!(
            "file name too long to store: {}",
            input.display()
        )));
    }

    let header = EnvelopeHeader {
        path: output.to_path_buf(),
        tag: *ctx.verification_tag(),
        checksum,
        padding: padding_for(len),
        encrypted_name: encrypt_name(ctx.round_keys(), &base_name),
    };

    let mut buf = alloc_buffer(opts.block_buffer_size())?;
    let out = File::create(output).map_err(|e| CryptError::io(output, e))?;
    let guard = PartialOutput::new(output);

    let mut reader = BufReader::with_capacity(buf.len(), file.take(len));
    let mut writer = BufWriter::with_capacity(buf.len(), out);
    header
        .write_to(&mut writer)
        .map_err(|e| CryptError::io(output, e))?;

    let mut total = 0u64;
    loop {
        let n = read_full(&mut reader, &mut buf).map_err(|e| CryptError::io(input, e))?;
        if n == 0 {
            break;
        }
        let padded = n.next_multiple_of(BLOCK_SIZE);
        buf[n..padded].fill(0);
        process_blocks_with_threshold(
            ctx.round_keys(),
            &mut buf[..padded],
            Mode::Encrypt,
            opts.parallel_threshold,
        )?;
        writer
            .write_all(&buf[..padded])
            .map_err(|e| CryptError::io(output, e))?;
        total += n as u64;
        if n < buf.len() {
            break;
        }
    }

    if total != len {
        return Err(CryptError::io(
            input,
            std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("input shrank from {len} to {total} bytes while encrypting"),
            ),
        ));
    }

    writer
        .into_inner()
        .map_err(|e| CryptError::io(output, e.into_error()))?
        .sync_all()
        .map_err(|e| CryptError::io(output, e))?;

    guard.commit();
    debug!(input = %input.display(), output = %output.display(), bytes = total, "encrypted");
    Ok(total)
}

/// Decrypt `input` into `output` with default streaming options.
pub fn decrypt_file(
    ctx: &CipherContext,
    input: &Path,
    output: &Path,
    policy: CorruptionPolicy,
) -> CryptResult<u64> {
    decrypt_file_with(ctx, input, output, policy, &StreamOptions::default())
}

/// Decrypt `input` into `output`. Returns the plaintext length.
///
/// A wrong key is detected from the header alone; no output is created.
/// A checksum mismatch after decryption yields [`CryptError::Integrity`] and
/// the output is kept or removed according to `policy`. If the output cannot
/// be re-read for the checksum it is always removed.
pub fn decrypt_file_with(
    ctx: &CipherContext,
    input: &Path,
    output: &Path,
    policy: CorruptionPolicy,
    opts: &StreamOptions,
) -> CryptResult<u64> {
    ensure_distinct(input, output)?;

    let file = open_input(input)?;
    let file_len = file
        .metadata()
        .map_err(|e| CryptError::io(input, e))?
        .len();
    let mut reader = BufReader::new(file);

    let fixed = read_fixed(&mut reader, input)?;
    if !ctx.matches_tag(&fixed.tag) {
        return Err(CryptError::KeyMismatch {
            path: input.to_path_buf(),
        });
    }

    skip_name(&mut reader, input, fixed.name_len)?;

    let body_len = file_len
        .checked_sub((HEADER_FIXED_LEN + fixed.name_len) as u64)
        .ok_or_else(|| CryptError::Format(input.display().to_string()))?;
    if body_len % BLOCK_SIZE as u64 != 0 || (body_len == 0 && fixed.padding != 0) {
        return Err(CryptError::Format(input.display().to_string()));
    }

    let mut buf = alloc_buffer(opts.block_buffer_size())?;
    let out = File::create(output).map_err(|e| CryptError::io(output, e))?;
    let guard = PartialOutput::new(output);
    let mut writer = BufWriter::with_capacity(buf.len(), out);

    let mut remaining = body_len;
    let mut total = 0u64;
    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        reader
            .read_exact(&mut buf[..n])
            .map_err(|e| CryptError::io(input, e))?;
        process_blocks_with_threshold(
            ctx.round_keys(),
            &mut buf[..n],
            Mode::Decrypt,
            opts.parallel_threshold,
        )?;
        remaining -= n as u64;

        let keep = if remaining == 0 {
            n - fixed.padding as usize
        } else {
            n
        };
        writer
            .write_all(&buf[..keep])
            .map_err(|e| CryptError::io(output, e))?;
        total += keep as u64;
    }

    writer
        .into_inner()
        .map_err(|e| CryptError::io(output, e.into_error()))?
        .sync_all()
        .map_err(|e| CryptError::io(output, e))?;

    // Re-read what actually landed on disk; failure here always discards.
    let written = File::open(output).map_err(|e| CryptError::io(output, e))?;
    verify_output(
        BufReader::new(written),
        &fixed.checksum,
        guard,
        policy,
        input,
        output,
    )?;

    debug!(input = %input.display(), output = %output.display(), bytes = total, "decrypted");
    Ok(total)
}

/// Check decrypted output against the stored checksum and settle `guard`.
///
/// A read error drops the guard, removing the output regardless of `policy`.
fn verify_output<R: Read>(
    reader: R,
    expected: &Digest128,
    guard: PartialOutput<'_>,
    policy: CorruptionPolicy,
    input: &Path,
    output: &Path,
) -> CryptResult<()> {
    let (actual, _) = digest128_reader(reader).map_err(|e| CryptError::io(output, e))?;
    if actual != *expected {
        warn!(input = %input.display(), output = %output.display(), "content checksum mismatch");
        let kept = policy == CorruptionPolicy::Keep;
        if kept {
            guard.commit();
        }
        return Err(CryptError::Integrity {
            what: input.display().to_string(),
            kept,
        });
    }
    guard.commit();
    Ok(())
}

#[cfg(unix)]
fn name_from_bytes(raw: Vec<u8>) -> CryptResult<OsString> {
    use std::os::unix::ffi::OsStringExt;
    Ok(OsString::from_vec(raw))
}

#[cfg(not(unix))]
fn name_from_bytes(raw: Vec<u8>) -> CryptResult<OsString> {
    String::from_utf8(raw)
        .map(OsString::from)
        .map_err(|e| CryptError::Format(format!("stored name not representable here: {e}")))
}

/// Removes the output file on drop unless committed.
struct PartialOutput<'a> {
    path: &'a Path,
    committed: bool,
}

impl<'a> PartialOutput<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialOutput<'_> {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(self.path) {
                warn!(path = %self.path.display(), "unable to remove partial output: {e}");
            }
        }
    }
}

fn ensure_distinct(input: &Path, output: &Path) -> CryptResult<()> {
    let same = input == output
        || matches!(
            (std::fs::canonicalize(input), std::fs::canonicalize(output)),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(CryptError::Input(format!(
            "source and destination are identical ({})",
            input.display()
        )));
    }
    Ok(())
}

fn open_input(path: &Path) -> CryptResult<File> {
    File::open(path)
        .map_err(|e| CryptError::Input(format!("unable to open {}: {e}", path.display())))
}

fn alloc_buffer(size: usize) -> CryptResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| CryptError::Allocation(size))?;
    buf.resize(size, 0);
    Ok(buf)
}

fn read_fixed<R: Read>(reader: &mut R, path: &Path) -> CryptResult<FixedHeader> {
    let mut raw = [0u8; HEADER_FIXED_LEN];
    reader
        .read_exact(&mut raw)
        .map_err(|e| header_read_error(path, e))?;

    let mut tag = [0u8; 32];
    tag.copy_from_slice(&raw[..32]);
    let mut checksum = [0u8; 16];
    checksum.copy_from_slice(&raw[32..48]);
    let padding = raw[48];
    let name_len = u16::from_le_bytes([raw[49], raw[50]]) as usize;

    if padding as usize >= BLOCK_SIZE
        || name_len < NAME_DIGEST_SIZE
        || (name_len - NAME_DIGEST_SIZE) % BLOCK_SIZE != 0
    {
        return Err(CryptError::Format(path.display().to_string()));
    }

    Ok(FixedHeader {
        tag,
        checksum,
        padding,
        name_len,
    })
}

fn read_name<R: Read>(reader: &mut R, path: &Path, len: usize) -> CryptResult<Vec<u8>> {
    let mut name = Vec::new();
    name.try_reserve_exact(len)
        .map_err(|_| CryptError::Allocation(len))?;
    name.resize(len, 0);
    reader
        .read_exact(&mut name)
        .map_err(|e| header_read_error(path, e))?;
    Ok(name)
}

fn skip_name<R: Read>(reader: &mut R, path: &Path, len: usize) -> CryptResult<()> {
    let skipped = std::io::copy(&mut reader.take(len as u64), &mut std::io::sink())
        .map_err(|e| CryptError::io(path, e))?;
    if skipped != len as u64 {
        return Err(CryptError::Format(path.display().to_string()));
    }
    Ok(())
}

fn header_read_error(path: &Path, e: std::io::Error) -> CryptError {
    if e.kind() == ErrorKind::UnexpectedEof {
        CryptError::Format(path.display().to_string())
    } else {
        CryptError::io(path, e)
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
