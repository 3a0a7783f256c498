// Request/response contracts
// Field names are part of the wire format; integers travel as decimal strings

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_bit_length() -> u64 {
    512
}

fn default_rounds() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrimeGenerationRequest {
    #[serde(default = "default_bit_length")]
    pub bit_length: u64,
    #[serde(default = "default_rounds")]
    pub miller_rabin_rounds: u32,
}

impl Default for PrimeGenerationRequest {
    fn default() -> Self {
        Self {
            bit_length: default_bit_length(),
            miller_rabin_rounds: default_rounds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimeGenerationResponse {
    pub p: String,
    pub q: String,
    /// Seconds
    pub generation_time: f64,
    pub bit_length: u64,
    pub miller_rabin_rounds: u32,
}

/// Optional inputs to key generation. With both `p` and `q` the derivation
/// is stateless; otherwise the session's primes are used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeyGenerationRequest {
    pub e: Option<String>,
    pub p: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyBody {
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateKeyBody {
    pub n: String,
    pub d: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsaParameters {
    pub n: String,
    pub phi_n: String,
    pub e: String,
    pub d: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeysResponse {
    pub public_key: PublicKeyBody,
    pub private_key: PrivateKeyBody,
    pub parameters: RsaParameters,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EncryptionRequest {
    pub message: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// 1-based position of the block
    pub block_number: usize,
    pub original_value: String,
    pub encrypted_value: String,
    pub original_hex: String,
    pub encrypted_hex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionResponse {
    pub encrypted_blocks: Vec<String>,
    pub block_info: Vec<BlockInfo>,
    pub total_blocks: usize,
    /// Characters
    pub message_length: usize,
    /// UTF-8 bytes; pass back on decryption to restore the final block exactly
    pub byte_length: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecryptionRequest {
    pub encrypted_blocks: Vec<String>,
    pub n: String,
    pub d: String,
    #[serde(default)]
    pub byte_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptionResponse {
    pub decrypted_message: String,
    pub success: bool,
    pub block_count: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredEncryptionRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredDecryptionRequest {
    pub encrypted_blocks: Vec<String>,
    #[serde(default)]
    pub byte_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPrimesResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miller_rabin_rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_bit_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_bit_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub n_bit_length: u64,
    pub is_valid: bool,
    pub strength: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentKeysResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_info: Option<KeyInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateKeysResponse {
    pub is_valid: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub primes_available: bool,
    pub keys_generated: bool,
    pub system_info: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
    pub timestamp: String,
}
