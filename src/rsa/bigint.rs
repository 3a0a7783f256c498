// RSA Big Integer Operations
// Wrapper around num-bigint for RSA-specific operations

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::Rng;

use crate::error::{RsaError, RsaResult};

/// RSA Big Integer type alias
pub type RsaBigInt = BigUint;

/// Create a big integer from u64
pub fn from_u64(n: u64) -> RsaBigInt {
    RsaBigInt::from(n)
}

/// Create a big integer from bytes (big-endian)
pub fn from_bytes(bytes: &[u8]) -> RsaBigInt {
    RsaBigInt::from_bytes_be(bytes)
}

/// Convert big integer to bytes (big-endian)
pub fn to_bytes(n: &RsaBigInt) -> Vec<u8> {
    n.to_bytes_be()
}

/// Number of significant bits (0 for zero)
pub fn bit_length(n: &RsaBigInt) -> u64 {
    n.bits()
}

/// Hex display form, e.g. `0x41`
pub fn to_hex(n: &RsaBigInt) -> String {
    format!("0x{}", hex::encode(to_bytes(n)))
}

/// Parse a decimal-string literal into a non-negative big integer.
/// Returns the human-readable reason on failure; callers pick the error kind.
pub fn parse_decimal(value: &str) -> Result<RsaBigInt, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty decimal string".to_string());
    }
    if let Some(rest) = value.strip_prefix('-') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("negative value {} is not allowed", value));
        }
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{:?} is not a decimal integer", value));
    }
    RsaBigInt::parse_bytes(value.as_bytes(), 10)
        .ok_or_else(|| format!("{:?} is not a decimal integer", value))
}

/// Modular exponentiation: base^exp mod modulus
/// Uses square-and-multiply algorithm
///
/// A modulus of 0 or 1 yields 0; callers validate `modulus > 1`.
pub fn mod_pow(base: &RsaBigInt, exp: &RsaBigInt, modulus: &RsaBigInt) -> RsaBigInt {
    if modulus.is_zero() || modulus.is_one() {
        return RsaBigInt::zero();
    }

    let mut result = RsaBigInt::one();
    let mut base = base % modulus;
    let mut exp = exp.clone();

    while !exp.is_zero() {
        if exp.is_odd() {
            result = (&result * &base) % modulus;
        }
        base = (&base * &base) % modulus;
        exp >>= 1;
    }

    result
}

/// Extended Euclidean Algorithm
/// Returns (gcd, x, y) such that a*x + b*y = gcd = gcd(a, b)
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let q = &old_r / &r;

        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);

        let next_t = &old_t - &q * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    (old_r, old_s, old_t)
}

/// Compute modular inverse: a^(-1) mod m
/// Fails with InvalidExponent when gcd(a, m) != 1
pub fn mod_inverse(a: &RsaBigInt, m: &RsaBigInt) -> RsaResult<RsaBigInt> {
    if m <= &RsaBigInt::one() {
        return Err(RsaError::InvalidExponent(format!(
            "modulus {} has no invertible elements",
            m
        )));
    }

    let a_signed = BigInt::from_biguint(Sign::Plus, a.clone());
    let m_signed = BigInt::from_biguint(Sign::Plus, m.clone());
    let (gcd, x, _) = extended_gcd(&a_signed, &m_signed);

    if !gcd.is_one() {
        return Err(RsaError::InvalidExponent(format!(
            "{} is not invertible modulo {} (gcd = {})",
            a, m, gcd
        )));
    }

    // Bézout coefficient may be negative: bring it into [0, m)
    let mut x = x % &m_signed;
    if x.is_negative() {
        x += &m_signed;
    }

    x.to_biguint()
        .ok_or_else(|| RsaError::Internal("modular inverse normalisation went negative".to_string()))
}

/// Greatest common divisor
pub fn gcd(a: &RsaBigInt, b: &RsaBigInt) -> RsaBigInt {
    a.gcd(b)
}

/// Miller-Rabin primality test
/// Returns true if n is probably prime after `rounds` random witnesses
pub fn is_probable_prime<R: Rng + ?Sized>(n: &RsaBigInt, rounds: u32, rng: &mut R) -> bool {
    let two = RsaBigInt::from(2u8);
    if n < &two {
        return false;
    }
    if n == &two || n == &RsaBigInt::from(3u8) {
        return true;
    }
    if n.is_even() {
        return false;
    }

    // Write n-1 as d * 2^s with d odd
    let n_minus_one = n - 1u8;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    'witness: for _ in 0..rounds {
        // Pick random witness a in [2, n-2]
        let a = rng.gen_biguint_range(&two, &n_minus_one);

        let mut x = mod_pow(&a, &d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }

        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }

        // Composite
        return false;
    }

    // Probably prime
    true
}
