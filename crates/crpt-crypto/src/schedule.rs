//! Key schedule: 128-bit master key → 9 × 6 encryption and decryption subkeys
//!
//! Forward subkeys are read as consecutive 16-bit words of the key register;
//! after every 8 words the 128-bit register is rotated left by 25 bits.
//! The decryption table is filled in the same pass, walking rounds backwards:
//!
//! ```text
//! slot 0, 3   inverse[8-r][s] = mul_inv(forward[r][s])
//! slot 1, 2   inverse[8-r][s'] = add_inv(forward[r][s]),  s' = 3-s for r in 1..=7, else s
//! slot 4, 5   inverse[8-r][s] = forward[r-1][s]            (r > 0 only)
//! ```

use zeroize::Zeroize;

use crate::arith::{add_inv, mul_inv};
use crate::kdf::MasterKey;

/// Full rounds before the output transform
pub const ROUNDS: usize = 8;

/// Subkeys consumed by one round
pub const SUBKEYS_PER_ROUND: usize = 6;

/// Subkey table: 8 rounds followed by the output transform group
pub type SubkeyTable = [[u16; SUBKEYS_PER_ROUND]; ROUNDS + 1];

/// Direction a subkey table drives the cipher in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

/// Expanded subkeys for both directions, derived from one master key.
///
/// Read-only after construction; share it by reference between threads.
#[derive(Clone)]
pub struct RoundKeySet {
    forward: SubkeyTable,
    inverse: SubkeyTable,
}

impl RoundKeySet {
    pub fn new(key: &MasterKey) -> Self {
        let mut forward = [[0u16; SUBKEYS_PER_ROUND]; ROUNDS + 1];
        let mut inverse = [[0u16; SUBKEYS_PER_ROUND]; ROUNDS + 1];

        let mut register = *key.words();
        let mut consumed = 0;

        for round in 0..=ROUNDS {
            let dst = ROUNDS - round;
            for slot in 0..SUBKEYS_PER_ROUND {
                if consumed == register.len() {
                    rotate_register(&mut register);
                    consumed = 0;
                }
                let k = register[consumed];
                consumed += 1;

                forward[round][slot] = k;
                match slot {
                    0 | 3 => inverse[dst][slot] = mul_inv(k),
                    1 | 2 => {
                        // The output transform un-swaps words 1 and 2, so only
                        // interior rounds see them exchanged.
                        let s = if (1..ROUNDS).contains(&round) { 3 - slot } else { slot };
                        inverse[dst][s] = add_inv(k);
                    }
                    _ => {
                        if round > 0 {
                            inverse[dst][slot] = forward[round - 1][slot];
                        }
                    }
                }
            }
        }

        register.zeroize();
        Self { forward, inverse }
    }

    pub fn forward(&self) -> &SubkeyTable {
        &self.forward
    }

    pub fn inverse(&self) -> &SubkeyTable {
        &self.inverse
    }

    pub fn table(&self, mode: Mode) -> &SubkeyTable {
        match mode {
            Mode::Encrypt => &self.forward,
            Mode::Decrypt => &self.inverse,
        }
    }
}

impl Drop for RoundKeySet {
    fn drop(&mut self) {
        self.forward.zeroize();
        self.inverse.zeroize();
    }
}

impl std::fmt::Debug for RoundKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundKeySet")
            .field("forward", &"[REDACTED]")
            .field("inverse", &"[REDACTED]")
            .finish()
    }
}

/// Rotate the 8-word register (word 0 most significant) left by 25 bits.
fn rotate_register(words: &mut [u16; 8]) {
    let mut reg = words
        .iter()
        .fold(0u128, |acc, &w| (acc << 16) | w as u128)
        .rotate_left(25);
    for (i, w) in words.iter_mut().enumerate() {
        *w = (reg >> (16 * (7 - i))) as u16;
    }
    reg.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::mul_mod;

    fn sequential_key() -> MasterKey {
        MasterKey::from_words([1, 2, 3, 4, 5, 6, 7, 8])
    }

    #[test]
    fn first_subkeys_are_key_words() {
        let ks = RoundKeySet::new(&sequential_key());
        assert_eq!(ks.forward()[0], [1, 2, 3, 4, 5, 6]);
        assert_eq!(ks.forward()[1][0..2], [7, 8]);
    }

    #[test]
    fn register_rotates_by_25_bits() {
        let ks = RoundKeySet::new(&sequential_key());
        // Words 8..16 of the expanded key: 0400 0600 0800 0a00 0c00 0e00 1000 0200
        let expanded: Vec<u16> = ks.forward().iter().flatten().copied().collect();
        assert_eq!(
            &expanded[8..16],
            &[0x0400, 0x0600, 0x0800, 0x0a00, 0x0c00, 0x0e00, 0x1000, 0x0200]
        );
    }

    #[test]
    fn rotate_register_wraps_top_bits() {
        let mut words = [0x8000, 0, 0, 0, 0, 0, 0, 0];
        rotate_register(&mut words);
        // Bit 127 moves to bit 24 → word 6, bit 8
        assert_eq!(words, [0, 0, 0, 0, 0, 0, 0x0100, 0]);
    }

    #[test]
    fn inverse_multiplicative_slots() {
        let ks = RoundKeySet::new(&sequential_key());
        for round in 0..=ROUNDS {
            for slot in [0, 3] {
                let product = mul_mod(ks.forward()[round][slot], ks.inverse()[ROUNDS - round][slot]);
                assert_eq!(product, 1, "round {round} slot {slot}");
            }
        }
    }

    #[test]
    fn inverse_additive_slots_swap_only_inside() {
        let ks = RoundKeySet::new(&sequential_key());
        let (f, i) = (ks.forward(), ks.inverse());

        // Boundary rounds keep their slot
        assert_eq!(i[8][1], add_inv(f[0][1]));
        assert_eq!(i[8][2], add_inv(f[0][2]));
        assert_eq!(i[0][1], add_inv(f[8][1]));
        assert_eq!(i[0][2], add_inv(f[8][2]));

        // Interior rounds swap 1 and 2
        for round in 1..ROUNDS {
            assert_eq!(i[ROUNDS - round][2], add_inv(f[round][1]), "round {round}");
            assert_eq!(i[ROUNDS - round][1], add_inv(f[round][2]), "round {round}");
        }
    }

    #[test]
    fn inverse_ma_slots_copied_from_previous_round() {
        let ks = RoundKeySet::new(&sequential_key());
        for round in 1..=ROUNDS {
            assert_eq!(ks.inverse()[ROUNDS - round][4], ks.forward()[round - 1][4]);
            assert_eq!(ks.inverse()[ROUNDS - round][5], ks.forward()[round - 1][5]);
        }
        // Output transform group never carries MA keys
        assert_eq!(ks.inverse()[ROUNDS][4..], [0, 0]);
    }

    #[test]
    fn table_selects_direction() {
        let ks = RoundKeySet::new(&sequential_key());
        assert_eq!(ks.table(Mode::Encrypt), ks.forward());
        assert_eq!(ks.table(Mode::Decrypt), ks.inverse());
    }

    #[test]
    fn debug_redacts_subkeys() {
        let ks = RoundKeySet::new(&sequential_key());
        let rendered = format!("{ks:?}");
        assert!(rendered.contains("REDACTED"));
    }
}
