use std::hash::Hasher;

use num_bigint::BigUint;
use rustc_hash::FxHasher;

/// Hash of a serialized state.
///
/// Both the bucket and the shard of a state are derived from this value, the
/// bucket from the low bits and the shard from the high bits.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_usize(bytes.len());
    hasher.write(bytes);
    // FxHasher leaves the low bits poorly mixed for short inputs.
    mix64(hasher.finish())
}

/// Finalizer of [SplitMix64][splitmix].
///
/// [splitmix]: https://prng.di.unimi.it/splitmix64.c
pub fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Binomial coefficient `C(n, k)`.
pub fn binomial(n: usize, k: usize) -> BigUint {
    if k > n {
        return BigUint::ZERO;
    }
    let k = k.min(n - k);
    let mut result = BigUint::from(1u32);
    for i in 0..k {
        result *= n - i;
        result /= i + 1;
    }
    result
}

/// Number of fault sets over `n` faults, `2^n`.
pub fn lattice_size(n: usize) -> BigUint {
    BigUint::from(1u32) << n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial() {
        // n\k  0  1  2  3  4
        // ------------------
        // 0    1
        // 1    1  1
        // 2    1  2  1
        // 3    1  3  3  1
        // 4    1  4  6  4  1
        assert_eq!(binomial(0, 0), BigUint::from(1u32));
        assert_eq!(binomial(3, 1), BigUint::from(3u32));
        assert_eq!(binomial(4, 2), BigUint::from(6u32));
        assert_eq!(binomial(4, 4), BigUint::from(1u32));
        assert_eq!(binomial(3, 4), BigUint::ZERO);
        assert_eq!(binomial(100, 50).to_string(), "100891344545564193334812497256");
    }

    #[test]
    fn test_lattice_size() {
        assert_eq!(lattice_size(0), BigUint::from(1u32));
        assert_eq!(lattice_size(3), BigUint::from(8u32));
        assert_eq!(lattice_size(70).bits(), 71);
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(hash_bytes(&[1, 2, 3]), hash_bytes(&[1, 2, 3]));
        assert_ne!(hash_bytes(&[1, 2, 3]), hash_bytes(&[1, 2, 4]));
    }
}
