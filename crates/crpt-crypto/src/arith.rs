//! Arithmetic modulo 65537 and 65536 on 16-bit words
//!
//! Multiplication works in the multiplicative group of GF(65537), where the
//! word value `0` stands for 65536 (≡ -1). Every nonzero residue fits in 16
//! bits under that convention.

const MODULUS: u32 = 0x10001;

/// Multiply two words modulo 65537 (0 encodes 65536).
pub fn mul_mod(x1: u16, x2: u16) -> u16 {
    match (x1, x2) {
        (0, 0) => 1,
        (0, x) | (x, 0) => (MODULUS - x as u32) as u16,
        _ => {
            let m = x1 as u32 * x2 as u32;
            let r = m & 0xFFFF;
            let q = m >> 16;
            if r >= q {
                (r - q) as u16
            } else {
                (MODULUS + r - q) as u16
            }
        }
    }
}

/// Multiplicative inverse modulo 65537 via the extended Euclidean algorithm.
///
/// `0` and `1` are their own inverses.
pub fn mul_inv(x: u16) -> u16 {
    if x <= 1 {
        return x;
    }

    let (mut r2, mut r1) = (MODULUS as i64, x as i64);
    let (mut v2, mut v1) = (0i64, 1i64);

    while r1 != 1 {
        let q = r2 / r1;
        (r2, r1) = (r1, r2 - q * r1);
        (v2, v1) = (v1, v2 - q * v1);
    }

    v1.rem_euclid(MODULUS as i64) as u16
}

/// Additive inverse modulo 65536.
pub fn add_inv(x: u16) -> u16 {
    x.wrapping_neg()
}
