//! Single-block cipher: 8 rounds plus the output transform
//!
//! Blocks are four 16-bit words. On disk a block is 8 bytes holding the
//! words in little-endian order.

use crate::arith::mul_mod;
use crate::schedule::{Mode, RoundKeySet, SubkeyTable, ROUNDS};

/// Size of a cipher block in bytes
pub const BLOCK_SIZE: usize = 8;

/// A 64-bit block as four words
pub type Block = [u16; 4];

/// Encrypt one block with the forward subkeys.
pub fn encrypt(block: Block, keys: &RoundKeySet) -> Block {
    transform(block, keys.forward())
}

/// Decrypt one block with the inverse subkeys.
pub fn decrypt(block: Block, keys: &RoundKeySet) -> Block {
    transform(block, keys.inverse())
}

/// Run one block through the cipher in the given direction.
pub fn process(block: Block, keys: &RoundKeySet, mode: Mode) -> Block {
    transform(block, keys.table(mode))
}

/// Encipher an 8-byte chunk in place.
pub fn process_bytes(chunk: &mut [u8; BLOCK_SIZE], keys: &RoundKeySet, mode: Mode) {
    let out = process(block_from_bytes(chunk), keys, mode);
    *chunk = block_to_bytes(&out);
}

pub fn block_from_bytes(bytes: &[u8; BLOCK_SIZE]) -> Block {
    [
        u16::from_le_bytes([bytes[0], bytes[1]]),
        u16::from_le_bytes([bytes[2], bytes[3]]),
        u16::from_le_bytes([bytes[4], bytes[5]]),
        u16::from_le_bytes([bytes[6], bytes[7]]),
    ]
}

pub fn block_to_bytes(block: &Block) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for (pair, w) in out.chunks_exact_mut(2).zip(block.iter()) {
        pair.copy_from_slice(&w.to_le_bytes());
    }
    out
}

fn transform(block: Block, table: &SubkeyTable) -> Block {
    let state = table[..ROUNDS]
        .iter()
        .fold(block, |state, keys| round(state, keys));
    output_transform(state, &table[ROUNDS])
}

fn round(x: Block, k: &[u16; 6]) -> Block {
    let a1 = mul_mod(x[0], k[0]);
    let a2 = x[2].wrapping_add(k[2]);
    let a3 = x[1].wrapping_add(k[1]);
    let a4 = mul_mod(x[3], k[3]);
    let a5 = mul_mod(k[4], a1 ^ a2);
    let a6 = mul_mod(k[5], a5.wrapping_add(a3 ^ a4));
    let a5 = a5.wrapping_add(a6);

    [a1 ^ a6, a6 ^ a2, a3 ^ a5, a5 ^ a4]
}

/// Final half-round; words 1 and 2 trade places relative to `round`.
fn output_transform(x: Block, k: &[u16; 6]) -> Block {
    [
        mul_mod(k[0], x[0]),
        x[2].wrapping_add(k[1]),
        x[1].wrapping_add(k[2]),
        mul_mod(k[3], x[3]),
    ]
}
