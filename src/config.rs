// Service configuration
// Limits for prime generation and messages, read from RSA_ENGINE_* variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

/// Configuration shared by the generator, the engine and the request layer
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub min_prime_bit_length: u64,
    pub max_prime_bit_length: u64,
    pub min_miller_rabin_rounds: u32,
    pub max_miller_rabin_rounds: u32,
    /// Candidates drawn per prime before giving up
    pub max_prime_attempts: u32,
    pub prime_generation_timeout: Duration,
    /// Maximum message length in characters
    pub max_message_length: usize,
    pub default_public_exponent: u64,
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            min_prime_bit_length: 256,
            max_prime_bit_length: 2048,
            min_miller_rabin_rounds: 1,
            max_miller_rabin_rounds: 100,
            max_prime_attempts: 10_000,
            prime_generation_timeout: Duration::from_secs(300),
            max_message_length: 10_000,
            default_public_exponent: 65537,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from the environment, falling back to defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            min_prime_bit_length: read_var("RSA_ENGINE_MIN_BIT_LENGTH", defaults.min_prime_bit_length)?,
            max_prime_bit_length: read_var("RSA_ENGINE_MAX_BIT_LENGTH", defaults.max_prime_bit_length)?,
            min_miller_rabin_rounds: read_var("RSA_ENGINE_MIN_ROUNDS", defaults.min_miller_rabin_rounds)?,
            max_miller_rabin_rounds: read_var("RSA_ENGINE_MAX_ROUNDS", defaults.max_miller_rabin_rounds)?,
            max_prime_attempts: read_var("RSA_ENGINE_MAX_ATTEMPTS", defaults.max_prime_attempts)?,
            prime_generation_timeout: Duration::from_secs(read_var(
                "RSA_ENGINE_TIMEOUT_SECS",
                defaults.prime_generation_timeout.as_secs(),
            )?),
            max_message_length: read_var("RSA_ENGINE_MAX_MESSAGE_LENGTH", defaults.max_message_length)?,
            default_public_exponent: read_var(
                "RSA_ENGINE_PUBLIC_EXPONENT",
                defaults.default_public_exponent,
            )?,
            version: defaults.version,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no request could ever satisfy
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_prime_bit_length < 16 {
            bail!("minimum prime bit length must be at least 16, got {}", self.min_prime_bit_length);
        }
        if self.min_prime_bit_length > self.max_prime_bit_length {
            bail!(
                "bit length range is inverted: {}..{}",
                self.min_prime_bit_length,
                self.max_prime_bit_length
            );
        }
        if self.min_miller_rabin_rounds == 0 || self.min_miller_rabin_rounds > self.max_miller_rabin_rounds {
            bail!(
                "invalid Miller-Rabin round range: {}..{}",
                self.min_miller_rabin_rounds,
                self.max_miller_rabin_rounds
            );
        }
        if self.max_prime_attempts == 0 {
            bail!("max prime attempts must be positive");
        }
        if self.default_public_exponent < 3 || self.default_public_exponent % 2 == 0 {
            bail!("default public exponent must be odd and at least 3");
        }
        Ok(())
    }

    pub fn with_bit_length_range(mut self, min: u64, max: u64) -> Self {
        self.min_prime_bit_length = min;
        self.max_prime_bit_length = max;
        self
    }

    pub fn with_rounds_range(mut self, min: u32, max: u32) -> Self {
        self.min_miller_rabin_rounds = min;
        self.max_miller_rabin_rounds = max;
        self
    }

    pub fn with_max_prime_attempts(mut self, attempts: u32) -> Self {
        self.max_prime_attempts = attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.prime_generation_timeout = timeout;
        self
    }

    pub fn with_max_message_length(mut self, length: usize) -> Self {
        self.max_message_length = length;
        self
    }
}

fn read_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e).with_context(|| format!("{} could not be read", name)),
    }
}
