// RSA Key Generation
// Derives public and private keys from a pair of primes

use num_traits::One;

use super::bigint::{bit_length, from_u64, gcd, mod_inverse, mod_pow, RsaBigInt};
use super::primes::{verify_prime, PrimePair};
use crate::error::{RsaError, RsaResult};

/// Standard public exponents, tried in order when the caller does not fix one
pub const STANDARD_EXPONENTS: [u64; 5] = [65537, 257, 17, 5, 3];

/// Rounds used when re-checking the primes handed to derivation
const FINAL_CHECK_ROUNDS: u32 = 20;

/// RSA Public Key
#[derive(Debug, Clone, PartialEq)]
pub struct RsaPublicKey {
    pub n: RsaBigInt,  // Modulus
    pub e: RsaBigInt,  // Public exponent
}

/// Pre-computed values for faster decryption
#[derive(Debug, Clone, PartialEq)]
pub struct CrtParams {
    pub p: RsaBigInt,      // First prime factor (p > q)
    pub q: RsaBigInt,      // Second prime factor
    pub d_p: RsaBigInt,    // d mod (p-1)
    pub d_q: RsaBigInt,    // d mod (q-1)
    pub q_inv: RsaBigInt,  // q^(-1) mod p
}

/// RSA Private Key
#[derive(Debug, Clone, PartialEq)]
pub struct RsaPrivateKey {
    pub n: RsaBigInt,  // Modulus (same as public)
    pub d: RsaBigInt,  // Private exponent
    /// Only present when the key was derived locally from its primes
    pub crt: Option<CrtParams>,
}

/// RSA Key Pair (both public and private keys)
#[derive(Debug, Clone, PartialEq)]
pub struct RsaKeyPair {
    pub public_key: RsaPublicKey,
    pub private_key: RsaPrivateKey,
    /// Euler's totient, kept for inspection only
    pub phi_n: RsaBigInt,
}

/// How the public exponent is chosen during derivation
#[derive(Debug, Clone, PartialEq)]
pub enum ExponentChoice {
    /// Try this exponent first, then fall back through STANDARD_EXPONENTS
    Preferred(u64),
    /// Use exactly this exponent or fail with InvalidExponent
    Fixed(RsaBigInt),
}

impl Default for ExponentChoice {
    fn default() -> Self {
        ExponentChoice::Preferred(65537)
    }
}

impl RsaPublicKey {
    /// Build a public key from caller-supplied components
    pub fn new(n: RsaBigInt, e: RsaBigInt) -> RsaResult<Self> {
        check_modulus(&n)?;
        if e < from_u64(1) {
            return Err(RsaError::InvalidParameter("public exponent e must be positive".to_string()));
        }
        Ok(Self { n, e })
    }

    /// Get the bit length of the modulus
    pub fn bit_length(&self) -> u64 {
        bit_length(&self.n)
    }
}

impl RsaPrivateKey {
    /// Build a private key from caller-supplied components (no CRT data)
    pub fn new(n: RsaBigInt, d: RsaBigInt) -> RsaResult<Self> {
        check_modulus(&n)?;
        if d < from_u64(1) {
            return Err(RsaError::InvalidParameter("private exponent d must be positive".to_string()));
        }
        Ok(Self { n, d, crt: None })
    }

    /// Get the bit length of the modulus
    pub fn bit_length(&self) -> u64 {
        bit_length(&self.n)
    }
}

impl RsaKeyPair {
    pub fn n(&self) -> &RsaBigInt {
        &self.public_key.n
    }

    pub fn e(&self) -> &RsaBigInt {
        &self.public_key.e
    }

    pub fn d(&self) -> &RsaBigInt {
        &self.private_key.d
    }

    /// Get the bit length of the modulus
    pub fn bit_length(&self) -> u64 {
        self.public_key.bit_length()
    }

    /// Encrypt and decrypt a probe value; true when the round trip holds
    pub fn validate(&self) -> bool {
        let n = self.n();
        let probe = if n > &from_u64(42) { from_u64(42) } else { from_u64(2) };
        if &probe >= n {
            return false;
        }
        let encrypted = mod_pow(&probe, self.e(), n);
        mod_pow(&encrypted, self.d(), n) == probe
    }
}

fn check_modulus(n: &RsaBigInt) -> RsaResult<()> {
    if n <= &RsaBigInt::one() {
        return Err(RsaError::InvalidParameter(format!("modulus n must be greater than 1, got {}", n)));
    }
    Ok(())
}

/// Derive a key pair from a generated prime pair
pub fn derive_from_pair(pair: &PrimePair, exponent: &ExponentChoice) -> RsaResult<RsaKeyPair> {
    derive_keypair(&pair.p.value, &pair.q.value, exponent)
}

/// Derive an RSA key pair from two primes
///
/// n = p*q, phi(n) = (p-1)(q-1), d = e^(-1) mod phi(n)
pub fn derive_keypair(p: &RsaBigInt, q: &RsaBigInt, exponent: &ExponentChoice) -> RsaResult<RsaKeyPair> {
    if p == q {
        return Err(RsaError::InvalidPrimePair("p and q must be different".to_string()));
    }
    for (name, value) in [("p", p), ("q", q)] {
        if !verify_prime(value, FINAL_CHECK_ROUNDS) {
            return Err(RsaError::InvalidPrimePair(format!("{} = {} is not prime", name, value)));
        }
    }

    // Ensure p > q (for q_inv calculation)
    let (p, q) = if p < q { (q.clone(), p.clone()) } else { (p.clone(), q.clone()) };

    // Step 1: Compute n = p * q
    let n = &p * &q;

    // Step 2: Compute φ(n) = (p-1)(q-1)
    let p_minus_1 = &p - 1u8;
    let q_minus_1 = &q - 1u8;
    let phi_n = &p_minus_1 * &q_minus_1;

    // Step 3: Choose e coprime with φ(n)
    let e = choose_exponent(&phi_n, exponent)?;

    // Step 4: Compute d = e^(-1) mod φ(n)
    let d = mod_inverse(&e, &phi_n)?;

    // Step 5: CRT parameters for faster decryption
    let crt = CrtParams {
        d_p: &d % &p_minus_1,
        d_q: &d % &q_minus_1,
        q_inv: mod_inverse(&q, &p).map_err(|_| {
            RsaError::InvalidPrimePair("q has no inverse modulo p".to_string())
        })?,
        p,
        q,
    };

    let keypair = RsaKeyPair {
        public_key: RsaPublicKey { n: n.clone(), e },
        private_key: RsaPrivateKey { n, d, crt: Some(crt) },
        phi_n,
    };

    if !keypair.validate() {
        return Err(RsaError::Internal("derived key pair failed validation".to_string()));
    }

    log::info!(
        "Derived {}-bit RSA key pair with e = {}",
        keypair.bit_length(),
        keypair.e()
    );
    Ok(keypair)
}

fn choose_exponent(phi_n: &RsaBigInt, exponent: &ExponentChoice) -> RsaResult<RsaBigInt> {
    let usable = |e: &RsaBigInt| e > &RsaBigInt::one() && e < phi_n && gcd(e, phi_n).is_one();

    match exponent {
        ExponentChoice::Fixed(e) => {
            if usable(e) {
                Ok(e.clone())
            } else {
                Err(RsaError::InvalidExponent(format!(
                    "e = {} must satisfy 1 < e < phi(n) and gcd(e, phi(n)) = 1",
                    e
                )))
            }
        }
        ExponentChoice::Preferred(preferred) => {
            let candidates = std::iter::once(*preferred)
                .chain(STANDARD_EXPONENTS.iter().copied().filter(|c| c != preferred));
            for candidate in candidates {
                let e = from_u64(candidate);
                if usable(&e) {
                    if candidate != *preferred {
                        log::warn!("e = {} unusable for this totient, falling back to e = {}", preferred, candidate);
                    }
                    return Ok(e);
                }
            }
            Err(RsaError::InvalidExponent(
                "no standard public exponent is coprime with phi(n)".to_string(),
            ))
        }
    }
}
