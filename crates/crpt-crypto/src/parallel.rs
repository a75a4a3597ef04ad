//! Buffer-level block processing, fanned out over the rayon pool
//!
//! Blocks carry no state between each other, so a buffer can be cut at any
//! 8-byte boundary and each piece enciphered independently. The parallel and
//! sequential paths produce identical bytes.

use rayon::prelude::*;

use crate::block::{process_bytes, BLOCK_SIZE};
use crate::error::{CryptError, CryptResult};
use crate::schedule::{Mode, RoundKeySet};

/// Buffers at least this large go to the rayon pool by default
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Bytes handed to one rayon task (512 blocks)
const TASK_SLICE: usize = 512 * BLOCK_SIZE;

/// Encipher `buf` in place, block by block.
///
/// `buf.len()` must be a multiple of [`BLOCK_SIZE`].
pub fn process_blocks(keys: &RoundKeySet, buf: &mut [u8], mode: Mode) -> CryptResult<()> {
    process_blocks_with_threshold(keys, buf, mode, DEFAULT_PARALLEL_THRESHOLD)
}

/// Like [`process_blocks`], with an explicit size above which work is parallelised.
pub fn process_blocks_with_threshold(
    keys: &RoundKeySet,
    buf: &mut [u8],
    mode: Mode,
    threshold: usize,
) -> CryptResult<()> {
    if buf.len() % BLOCK_SIZE != 0 {
        return Err(CryptError::BlockLength(buf.len()));
    }

    if buf.len() >= threshold && buf.len() > TASK_SLICE {
        buf.par_chunks_mut(TASK_SLICE)
            .for_each(|slice| process_sequential(keys, slice, mode));
    } else {
        process_sequential(keys, buf, mode);
    }
    Ok(())
}

fn process_sequential(keys: &RoundKeySet, buf: &mut [u8], mode: Mode) {
    let mut block = [0u8; BLOCK_SIZE];
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        block.copy_from_slice(chunk);
        process_bytes(&mut block, keys, mode);
        chunk.copy_from_slice(&block);
    }
}
