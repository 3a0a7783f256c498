// RSA Encryption Implementation
// Textbook RSA applied block by block: c = m^e mod n

use super::bigint::{mod_pow, to_hex, RsaBigInt};
use super::codec::{encode, PlainBlock};
use super::keygen::RsaPublicKey;
use crate::error::{RsaError, RsaResult};

/// One encrypted block alongside the plaintext value it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub index: usize,
    pub original_value: RsaBigInt,
    pub encrypted_value: RsaBigInt,
    pub width: usize,
}

impl Block {
    pub fn original_hex(&self) -> String {
        to_hex(&self.original_value)
    }

    pub fn encrypted_hex(&self) -> String {
        to_hex(&self.encrypted_value)
    }
}

/// Ordered encrypted blocks plus message totals
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionResult {
    pub blocks: Vec<Block>,
    /// Message length in characters
    pub message_length: usize,
    /// Message length in bytes, needed to restore a short final block exactly
    pub byte_length: usize,
}

impl EncryptionResult {
    pub fn total_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn encrypted_values(&self) -> Vec<RsaBigInt> {
        self.blocks.iter().map(|b| b.encrypted_value.clone()).collect()
    }
}

/// Encrypt a single integer; it must already be below the modulus
pub fn encrypt_value(m: &RsaBigInt, public_key: &RsaPublicKey) -> RsaResult<RsaBigInt> {
    if m >= &public_key.n {
        return Err(RsaError::InvalidBlock(format!(
            "plaintext value {} is not smaller than the modulus",
            m
        )));
    }
    Ok(mod_pow(m, &public_key.e, &public_key.n))
}

/// Encrypt already-encoded blocks, preserving their order
pub fn encrypt_blocks(blocks: &[PlainBlock], public_key: &RsaPublicKey) -> RsaResult<Vec<Block>> {
    blocks
        .iter()
        .map(|block| {
            Ok(Block {
                index: block.index,
                encrypted_value: encrypt_value(&block.value, public_key)?,
                original_value: block.value.clone(),
                width: block.width,
            })
        })
        .collect()
}

/// Encrypt bytes using RSA public key
pub fn encrypt_bytes(plaintext: &[u8], public_key: &RsaPublicKey) -> RsaResult<EncryptionResult> {
    let blocks = encode(plaintext, &public_key.n)?;
    let blocks = encrypt_blocks(&blocks, public_key)?;

    log::debug!("Encrypted {} bytes into {} blocks", plaintext.len(), blocks.len());
    Ok(EncryptionResult {
        blocks,
        message_length: plaintext.len(),
        byte_length: plaintext.len(),
    })
}

/// Encrypt a string using RSA public key
pub fn encrypt_string(plaintext: &str, public_key: &RsaPublicKey) -> RsaResult<EncryptionResult> {
    let mut result = encrypt_bytes(plaintext.as_bytes(), public_key)?;
    result.message_length = plaintext.chars().count();
    Ok(result)
}
