// Operation handlers
// Each handler validates its request, runs the engine and shapes the response

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use num_bigint::BigUint;

use super::schemas::*;
use crate::config::ServiceConfig;
use crate::error::{RsaError, RsaResult};
use crate::rsa::bigint::{bit_length, parse_decimal, RsaBigInt};
use crate::rsa::{
    decrypt_to_string, derive_from_pair, derive_keypair, encrypt_string, CancelToken, EncryptionResult,
    ExponentChoice, PrimeGenerator, RsaKeyPair, RsaPrivateKey, RsaPublicKey,
};
use crate::session::{InMemorySessionStore, SessionStore};
use crate::util::{format_large_number, key_strength};

/// Shared state behind every request: configuration, generator and sessions
#[derive(Clone)]
pub struct ApiContext {
    config: Arc<ServiceConfig>,
    generator: PrimeGenerator,
    store: Arc<dyn SessionStore>,
    started: Instant,
}

impl ApiContext {
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_store(config, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_store(config: ServiceConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            generator: PrimeGenerator::new(&config),
            config: Arc::new(config),
            store,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn create_session(&self) -> SessionResponse {
        SessionResponse {
            session_id: self.store.create(),
        }
    }

    /// DELETE /sessions
    pub fn delete_session(&self, session: &str) -> RsaResult<MessageResponse> {
        self.store.remove(session)?;
        Ok(MessageResponse {
            message: format!("Session {} removed", session),
        })
    }

    /// POST /primes/generate
    pub async fn generate_primes(&self, session: &str, request: PrimeGenerationRequest) -> RsaResult<PrimeGenerationResponse> {
        let bits = request.bit_length;
        let rounds = request.miller_rabin_rounds;
        self.generator.validate(bits, rounds)?;
        self.store.snapshot(session)?;

        let generator = self.generator.clone();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let task = tokio::task::spawn_blocking(move || generator.generate_prime_pair(bits, rounds, &worker_cancel));

        let pair = match tokio::time::timeout(self.config.prime_generation_timeout, task).await {
            Ok(joined) => joined.map_err(|e| RsaError::Internal(format!("prime worker failed: {}", e)))??,
            Err(_) => {
                cancel.cancel();
                log::warn!("Prime generation ({} bits) exceeded {:?}", bits, self.config.prime_generation_timeout);
                return Err(RsaError::Timeout(format!(
                    "prime generation did not finish within {} seconds",
                    self.config.prime_generation_timeout.as_secs_f64()
                )));
            }
        };

        let pair = self.store.replace_primes(session, pair)?;
        log::info!(
            "Session {}: stored {}-bit primes p = {}",
            session,
            bits,
            format_large_number(&pair.p.value, 50)
        );

        Ok(PrimeGenerationResponse {
            p: pair.p.value.to_string(),
            q: pair.q.value.to_string(),
            generation_time: pair.generation_time.as_secs_f64(),
            bit_length: pair.bit_length,
            miller_rabin_rounds: pair.miller_rabin_rounds,
        })
    }

    /// GET /primes/current
    pub fn current_primes(&self, session: &str) -> RsaResult<CurrentPrimesResponse> {
        let state = self.store.snapshot(session)?;
        Ok(match state.primes {
            None => CurrentPrimesResponse {
                status: "no_primes".to_string(),
                message: Some("No primes generated".to_string()),
                bit_length: None,
                generation_time: None,
                miller_rabin_rounds: None,
                p_bit_length: None,
                q_bit_length: None,
                error_probability: None,
            },
            Some(pair) => CurrentPrimesResponse {
                status: "primes_available".to_string(),
                message: None,
                bit_length: Some(pair.bit_length),
                generation_time: Some(pair.generation_time.as_secs_f64()),
                miller_rabin_rounds: Some(pair.miller_rabin_rounds),
                p_bit_length: Some(bit_length(&pair.p.value)),
                q_bit_length: Some(bit_length(&pair.q.value)),
                error_probability: Some(pair.error_probability()),
            },
        })
    }

    /// DELETE /primes/clear
    pub fn clear_primes(&self, session: &str) -> RsaResult<MessageResponse> {
        self.store.clear(session)?;
        Ok(MessageResponse {
            message: "Primes and keypairs cleared".to_string(),
        })
    }

    /// POST /keys/generate
    pub async fn generate_keys(&self, session: &str, request: KeyGenerationRequest) -> RsaResult<KeysResponse> {
        let exponent = match &request.e {
            Some(e) => ExponentChoice::Fixed(parse_parameter("e", e)?),
            None => ExponentChoice::Preferred(self.config.default_public_exponent),
        };

        let keypair = match (&request.p, &request.q) {
            (Some(p), Some(q)) => {
                let p = self.parse_prime("p", p)?;
                let q = self.parse_prime("q", q)?;
                run_blocking(move || derive_keypair(&p, &q, &exponent)).await?
            }
            (None, None) => {
                let primes = self.store.snapshot(session)?.primes.ok_or_else(|| {
                    RsaError::MissingPrerequisite(
                        "No primes available. Generate primes first using /primes/generate".to_string(),
                    )
                })?;
                let source = Arc::clone(&primes);
                let keypair = run_blocking(move || derive_from_pair(&source, &exponent)).await?;
                let stored = self.store.replace_keys(session, keypair, &primes)?;
                log::info!("Session {}: stored {}-bit key pair", session, stored.bit_length());
                (*stored).clone()
            }
            _ => {
                return Err(RsaError::InvalidParameter(
                    "p and q must be supplied together".to_string(),
                ))
            }
        };

        Ok(keys_response(&keypair))
    }

    /// GET /keys/current
    pub fn current_keys(&self, session: &str) -> RsaResult<CurrentKeysResponse> {
        let state = self.store.snapshot(session)?;
        Ok(match state.keys {
            None => CurrentKeysResponse {
                status: "no_keys".to_string(),
                message: Some("No keys generated".to_string()),
                public_key: None,
                key_info: None,
            },
            Some(keys) => CurrentKeysResponse {
                status: "keys_available".to_string(),
                message: None,
                public_key: Some(PublicKeyBody {
                    n: keys.n().to_string(),
                    e: keys.e().to_string(),
                }),
                key_info: Some(KeyInfo {
                    n_bit_length: keys.bit_length(),
                    is_valid: keys.validate(),
                    strength: key_strength(keys.bit_length()).to_string(),
                }),
            },
        })
    }

    /// POST /keys/validate
    pub fn validate_keys(&self, session: &str) -> RsaResult<ValidateKeysResponse> {
        let keys = self.session_keys(session)?;
        let is_valid = keys.validate();
        Ok(ValidateKeysResponse {
            is_valid,
            message: (if is_valid { "Keys are valid" } else { "Keys failed validation" }).to_string(),
        })
    }

    /// POST /crypto/encrypt
    pub async fn encrypt(&self, request: EncryptionRequest) -> RsaResult<EncryptionResponse> {
        let public_key = RsaPublicKey::new(parse_parameter("n", &request.n)?, parse_parameter("e", &request.e)?)?;
        self.encrypt_with(request.message, public_key).await
    }

    /// POST /crypto/decrypt
    pub async fn decrypt(&self, request: DecryptionRequest) -> RsaResult<DecryptionResponse> {
        let private_key = RsaPrivateKey::new(parse_parameter("n", &request.n)?, parse_parameter("d", &request.d)?)?;
        self.decrypt_with(&request.encrypted_blocks, private_key, request.byte_length).await
    }

    /// POST /crypto/encrypt-with-stored-keys
    pub async fn encrypt_with_stored_keys(&self, session: &str, request: StoredEncryptionRequest) -> RsaResult<EncryptionResponse> {
        let keys = self.session_keys(session)?;
        self.encrypt_with(request.message, keys.public_key.clone()).await
    }

    /// POST /crypto/decrypt-with-stored-keys
    pub async fn decrypt_with_stored_keys(&self, session: &str, request: StoredDecryptionRequest) -> RsaResult<DecryptionResponse> {
        let keys = self.session_keys(session)?;
        self.decrypt_with(&request.encrypted_blocks, keys.private_key.clone(), request.byte_length)
            .await
    }

    /// GET /health/
    pub fn health(&self, session: &str) -> RsaResult<HealthResponse> {
        let state = self.store.snapshot(session)?;
        let mut system_info = BTreeMap::new();
        system_info.insert("active_sessions".to_string(), self.store.session_count().to_string());
        system_info.insert("uptime_seconds".to_string(), self.started.elapsed().as_secs().to_string());
        system_info.insert("version".to_string(), self.config.version.clone());

        Ok(HealthResponse {
            status: "healthy".to_string(),
            timestamp: timestamp(),
            primes_available: state.primes.is_some(),
            keys_generated: state.keys.is_some(),
            system_info,
        })
    }

    /// GET /health/ready
    pub fn readiness(&self, session: &str) -> RsaResult<serde_json::Value> {
        let state = self.store.snapshot(session)?;
        let availability = |present: bool| if present { "available" } else { "not_generated" };
        Ok(serde_json::json!({
            "status": "ready",
            "timestamp": timestamp(),
            "components": {
                "prime_generator": "available",
                "rsa_crypto": "available",
                "current_state": {
                    "primes": availability(state.primes.is_some()),
                    "keys": availability(state.keys.is_some()),
                }
            }
        }))
    }

    /// GET /health/live
    pub fn liveness(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "alive",
            "timestamp": timestamp(),
            "version": self.config.version,
        })
    }

    /// GET /
    pub fn info(&self) -> serde_json::Value {
        serde_json::json!({
            "message": "RSA Cryptography API",
            "version": self.config.version,
            "status": "running",
            "endpoints": {
                "health_check": "/health/",
                "prime_generation": "/primes/generate",
                "key_generation": "/keys/generate",
                "encryption": "/crypto/encrypt",
                "decryption": "/crypto/decrypt",
                "sessions": "/sessions",
            }
        })
    }

    /// Caller-supplied primes are bounded like generated ones
    fn parse_prime(&self, field: &str, value: &str) -> RsaResult<RsaBigInt> {
        let prime = parse_parameter(field, value)?;
        let bits = bit_length(&prime);
        if bits > self.config.max_prime_bit_length {
            return Err(RsaError::InvalidParameter(format!(
                "{} has {} bits, maximum is {}",
                field, bits, self.config.max_prime_bit_length
            )));
        }
        Ok(prime)
    }

    fn session_keys(&self, session: &str) -> RsaResult<Arc<RsaKeyPair>> {
        self.store.snapshot(session)?.keys.ok_or_else(|| {
            RsaError::MissingPrerequisite("No keys available. Generate keys first.".to_string())
        })
    }

    async fn encrypt_with(&self, message: String, public_key: RsaPublicKey) -> RsaResult<EncryptionResponse> {
        let length = message.chars().count();
        if length > self.config.max_message_length {
            return Err(RsaError::InvalidParameter(format!(
                "message is {} characters long, maximum is {}",
                length, self.config.max_message_length
            )));
        }

        let result = run_blocking(move || encrypt_string(&message, &public_key)).await?;
        Ok(encryption_response(&result))
    }

    async fn decrypt_with(
        &self,
        encrypted_blocks: &[String],
        private_key: RsaPrivateKey,
        byte_length: Option<usize>,
    ) -> RsaResult<DecryptionResponse> {
        let values = parse_blocks(encrypted_blocks)?;
        let block_count = values.len();
        let decrypted_message = run_blocking(move || decrypt_to_string(&values, &private_key, byte_length)).await?;

        Ok(DecryptionResponse {
            decrypted_message,
            success: true,
            block_count,
        })
    }
}

/// Run CPU-bound engine work off the async executor
async fn run_blocking<T, F>(work: F) -> RsaResult<T>
where
    F: FnOnce() -> RsaResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RsaError::Internal(format!("worker failed: {}", e)))?
}

fn parse_parameter(field: &str, value: &str) -> RsaResult<RsaBigInt> {
    parse_decimal(value).map_err(|reason| RsaError::InvalidParameter(format!("{}: {}", field, reason)))
}

fn parse_blocks(blocks: &[String]) -> RsaResult<Vec<BigUint>> {
    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            parse_decimal(block).map_err(|reason| RsaError::InvalidBlock(format!("block {}: {}", index, reason)))
        })
        .collect()
}

fn keys_response(keypair: &RsaKeyPair) -> KeysResponse {
    let n = keypair.n().to_string();
    let e = keypair.e().to_string();
    let d = keypair.d().to_string();
    KeysResponse {
        public_key: PublicKeyBody { n: n.clone(), e: e.clone() },
        private_key: PrivateKeyBody { n: n.clone(), d: d.clone() },
        parameters: RsaParameters {
            n,
            phi_n: keypair.phi_n.to_string(),
            e,
            d,
        },
    }
}

fn encryption_response(result: &EncryptionResult) -> EncryptionResponse {
    EncryptionResponse {
        encrypted_blocks: result.blocks.iter().map(|b| b.encrypted_value.to_string()).collect(),
        block_info: result
            .blocks
            .iter()
            .map(|b| BlockInfo {
                block_number: b.index + 1,
                original_value: b.original_value.to_string(),
                encrypted_value: b.encrypted_value.to_string(),
                original_hex: b.original_hex(),
                encrypted_hex: b.encrypted_hex(),
            })
            .collect(),
        total_blocks: result.total_blocks(),
        message_length: result.message_length,
        byte_length: result.byte_length,
    }
}

pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
