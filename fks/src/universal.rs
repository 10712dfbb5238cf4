//! Universal family of hash functions `((a·key + b) mod P) mod m`.

use dyn_size_of::GetSize;
use rand::{CryptoRng, Rng};

/// Function drawn from the Carter-Wegman universal family
/// that maps `key` to `((a·key + b) mod P) mod output_range`.
///
/// For two distinct keys below `P`, the probability (over the random choice of `a` and `b`)
/// that they are mapped to the same value does not exceed about `1/output_range`.
/// The parameters are fixed at construction and the evaluation has no side effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniversalHash {
    a: u64,
    b: u64,
    modulus: u64,
    output_range: usize,
}

impl GetSize for UniversalHash {}

impl UniversalHash {
    /// Draws a function with `a` uniform in `[0, modulus)` and `b` uniform in `[1, modulus)`,
    /// which maps keys to `[0, output_range)`.
    ///
    /// `modulus` must be a prime greater than all keys that will be hashed
    /// and `output_range` must be positive.
    /// The parameters are taken from `rng`, which should be a cryptographically secure generator,
    /// so that the choice cannot be predicted by whoever picks the keys.
    pub fn new<R: Rng + CryptoRng>(rng: &mut R, modulus: u64, output_range: usize) -> Self {
        debug_assert!(modulus >= 2, "modulus must be a prime");
        debug_assert!(output_range >= 1, "output range must be positive");
        Self {
            a: rng.gen_range(0..modulus),
            b: rng.gen_range(1..modulus),
            modulus,
            output_range
        }
    }

    /// Returns function with the given parameters or [`None`] if they do not describe a member of the family,
    /// i.e. if `modulus < 2`, `output_range == 0`, `a >= modulus`, `b == 0` or `b >= modulus`.
    pub fn with_params(a: u64, b: u64, modulus: u64, output_range: usize) -> Option<Self> {
        (modulus >= 2 && output_range >= 1 && a < modulus && b != 0 && b < modulus)
            .then_some(Self { a, b, modulus, output_range })
    }

    /// Returns the value of `self` for `key`, in range `[0, output_range)`.
    #[inline(always)] pub fn get(&self, key: u64) -> usize {
        // a·key + b < 2^128 for all 64-bit operands
        let v = (self.a as u128 * key as u128 + self.b as u128) % self.modulus as u128;
        (v as u64 % self.output_range as u64) as usize
    }

    /// Returns the multiplier `a`.
    #[inline] pub fn a(&self) -> u64 { self.a }

    /// Returns the (non-zero) offset `b`.
    #[inline] pub fn b(&self) -> u64 { self.b }

    /// Returns the prime modulus `P`.
    #[inline] pub fn modulus(&self) -> u64 { self.modulus }

    /// Returns the number of values the function can return.
    #[inline] pub fn output_range(&self) -> usize { self.output_range }
}
