// Prime Generation
// Random odd candidates of an exact bit length, filtered by Miller-Rabin

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use num_bigint::RandBigInt;
use num_integer::Integer;
use rand::{thread_rng, Rng};

use super::bigint::{bit_length, is_probable_prime, RsaBigInt};
use crate::config::ServiceConfig;
use crate::error::{RsaError, RsaResult};

/// Small primes used to discard obvious composites before Miller-Rabin
const SMALL_PRIMES: [u32; 14] = [3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47];

/// Smallest bit length any generator accepts, whatever its configured range
const MIN_BIT_LENGTH: u64 = 8;

/// Re-draws allowed for q when it collides with p
const MAX_DISTINCT_RETRIES: u32 = 100;

/// Probability that a composite passes `rounds` Miller-Rabin rounds (upper bound)
pub fn miller_rabin_error_probability(rounds: u32) -> f64 {
    0.25f64.powi(rounds as i32)
}

/// Cooperative cancellation flag shared with an in-flight prime search
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A probable prime together with how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct LargePrime {
    pub value: RsaBigInt,
    pub bit_length: u64,
    pub rounds: u32,
    pub generation_time: Duration,
}

/// Two distinct primes of the same requested size
#[derive(Debug, Clone, PartialEq)]
pub struct PrimePair {
    pub p: LargePrime,
    pub q: LargePrime,
    pub bit_length: u64,
    pub miller_rabin_rounds: u32,
    pub generation_time: Duration,
}

impl PrimePair {
    /// Error probability bound for each prime of the pair
    pub fn error_probability(&self) -> f64 {
        miller_rabin_error_probability(self.miller_rabin_rounds)
    }
}

/// Generates probable primes within the configured limits
#[derive(Debug, Clone)]
pub struct PrimeGenerator {
    min_bit_length: u64,
    max_bit_length: u64,
    min_rounds: u32,
    max_rounds: u32,
    max_attempts: u32,
}

impl PrimeGenerator {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            min_bit_length: config.min_prime_bit_length,
            max_bit_length: config.max_prime_bit_length,
            min_rounds: config.min_miller_rabin_rounds,
            max_rounds: config.max_miller_rabin_rounds,
            max_attempts: config.max_prime_attempts,
        }
    }

    /// Check bit length and round count against the accepted ranges
    pub fn validate(&self, bit_length: u64, rounds: u32) -> RsaResult<()> {
        if bit_length < MIN_BIT_LENGTH {
            return Err(RsaError::InvalidParameter(format!(
                "bit_length must be at least {}, got {}",
                MIN_BIT_LENGTH, bit_length
            )));
        }
        if bit_length < self.min_bit_length || bit_length > self.max_bit_length {
            return Err(RsaError::InvalidParameter(format!(
                "bit_length must be between {} and {}, got {}",
                self.min_bit_length, self.max_bit_length, bit_length
            )));
        }
        if bit_length % 8 != 0 {
            return Err(RsaError::InvalidParameter(format!(
                "bit_length must be divisible by 8, got {}",
                bit_length
            )));
        }
        if rounds < self.min_rounds || rounds > self.max_rounds {
            return Err(RsaError::InvalidParameter(format!(
                "miller_rabin_rounds must be between {} and {}, got {}",
                self.min_rounds, self.max_rounds, rounds
            )));
        }
        Ok(())
    }

    /// Generate one probable prime of exactly `bit_length` bits
    pub fn generate_prime(&self, bit_length: u64, rounds: u32, cancel: &CancelToken) -> RsaResult<LargePrime> {
        self.validate(bit_length, rounds)?;
        let mut rng = thread_rng();
        self.search(bit_length, rounds, cancel, &mut rng)
    }

    /// Generate two distinct probable primes of `bit_length` bits each
    pub fn generate_prime_pair(&self, bit_length: u64, rounds: u32, cancel: &CancelToken) -> RsaResult<PrimePair> {
        self.validate(bit_length, rounds)?;
        let start = Instant::now();
        let mut rng = thread_rng();

        let p = self.search(bit_length, rounds, cancel, &mut rng)?;
        let mut q = self.search(bit_length, rounds, cancel, &mut rng)?;
        let mut retries = 0;
        while q.value == p.value {
            if retries >= MAX_DISTINCT_RETRIES {
                return Err(RsaError::PrimalityFailure(
                    "failed to generate two distinct primes".to_string(),
                ));
            }
            q = self.search(bit_length, rounds, cancel, &mut rng)?;
            retries += 1;
        }

        let generation_time = start.elapsed();
        log::info!(
            "Generated {}-bit prime pair with {} Miller-Rabin rounds in {:.3}s",
            bit_length,
            rounds,
            generation_time.as_secs_f64()
        );

        Ok(PrimePair {
            p,
            q,
            bit_length,
            miller_rabin_rounds: rounds,
            generation_time,
        })
    }

    fn search<R: Rng + ?Sized>(
        &self,
        bit_length: u64,
        rounds: u32,
        cancel: &CancelToken,
        rng: &mut R,
    ) -> RsaResult<LargePrime> {
        let start = Instant::now();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(RsaError::Cancelled(format!(
                    "prime search stopped after {} candidates",
                    attempt - 1
                )));
            }

            let candidate = random_candidate(bit_length, rng);
            if has_small_factor(&candidate) {
                continue;
            }

            if is_probable_prime(&candidate, rounds, rng) {
                log::debug!("Found {}-bit probable prime after {} candidates", bit_length, attempt);
                return Ok(LargePrime {
                    value: candidate,
                    bit_length,
                    rounds,
                    generation_time: start.elapsed(),
                });
            }
        }

        Err(RsaError::PrimalityFailure(format!(
            "no {}-bit prime found in {} candidates",
            bit_length, self.max_attempts
        )))
    }
}

/// Random odd integer with exactly `bit_length` bits (top and bottom bits set)
pub fn random_candidate<R: Rng + ?Sized>(bit_length: u64, rng: &mut R) -> RsaBigInt {
    let mut candidate = rng.gen_biguint(bit_length);
    candidate.set_bit(bit_length - 1, true);
    candidate.set_bit(0, true);
    candidate
}

fn has_small_factor(n: &RsaBigInt) -> bool {
    SMALL_PRIMES.iter().any(|&p| {
        let p = RsaBigInt::from(p);
        n > &p && n.is_multiple_of(&p)
    })
}

/// Check that a value is a probable prime of the expected size
pub fn verify_prime(value: &RsaBigInt, rounds: u32) -> bool {
    let mut rng = thread_rng();
    bit_length(value) >= 2 && is_probable_prime(value, rounds, &mut rng)
}
