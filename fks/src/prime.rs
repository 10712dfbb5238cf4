//! Primality utilities used to choose the modulus of the universal hash family.

/// Returns `(a * b) mod m`, computed without overflow.
#[inline(always)] fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

/// Returns `base^exp mod m`.
fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1 % m;
    base %= m;
    while exp != 0 {
        if exp & 1 == 1 { result = mul_mod(result, base, m); }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// Miller-Rabin bases that make the test deterministic for all 64-bit integers.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Returns whether `n` is a prime.
pub fn is_prime(n: u64) -> bool {
    if n < 2 { return false; }
    for p in WITNESSES {
        if n % p == 0 { return n == p; }
    }
    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;
    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 { continue; }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 { continue 'witness; }
        }
        return false;
    }
    true
}

/// Returns the smallest prime strictly greater than `n`,
/// or [`None`] if there is no such prime that fits in `u64`.
pub fn next_prime_above(n: u64) -> Option<u64> {
    if n < 2 { return Some(2); }
    let mut candidate = n.checked_add(1)? | 1;   // even numbers above 2 are composite
    while !is_prime(candidate) {
        candidate = candidate.checked_add(2)?;
    }
    Some(candidate)
}
