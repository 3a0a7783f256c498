// RSA Decryption Implementation
// Implements RSA decryption with Chinese Remainder Theorem (CRT) optimization

use super::bigint::{mod_pow, RsaBigInt};
use super::codec::{blocks_from_values, decode, PlainBlock};
use super::keygen::{CrtParams, RsaPrivateKey};
use crate::error::{RsaError, RsaResult};

/// Decrypt a single encrypted value; it must be below the modulus
pub fn decrypt_value(c: &RsaBigInt, private_key: &RsaPrivateKey) -> RsaResult<RsaBigInt> {
    if c >= &private_key.n {
        return Err(RsaError::InvalidBlock(format!(
            "encrypted value {} is not smaller than the modulus",
            c
        )));
    }

    Ok(match &private_key.crt {
        Some(crt) => decrypt_crt(c, crt, &private_key.n),
        None => mod_pow(c, &private_key.d, &private_key.n),
    })
}

/// Decrypt using Chinese Remainder Theorem (CRT)
/// This is faster than regular decryption because we work with smaller numbers
fn decrypt_crt(c: &RsaBigInt, key: &CrtParams, n: &RsaBigInt) -> RsaBigInt {
    // m1 = c^d_p mod p
    let m1 = mod_pow(c, &key.d_p, &key.p);

    // m2 = c^d_q mod q
    let m2 = mod_pow(c, &key.d_q, &key.q);

    // h = (m1 - m2) * q_inv mod p
    let diff = if m1 >= m2 {
        m1 - &m2
    } else {
        m1 + &key.p - (&m2 % &key.p)
    };
    let h = (diff * &key.q_inv) % &key.p;

    // m = m2 + q * h
    let m = m2 + &key.q * h;

    // Ensure m < n
    if &m >= n {
        return m - n;
    }

    m
}

/// Decrypt ordered encrypted values back into plaintext blocks
pub fn decrypt_blocks(
    encrypted: &[RsaBigInt],
    private_key: &RsaPrivateKey,
    byte_length: Option<usize>,
) -> RsaResult<Vec<PlainBlock>> {
    let values = encrypted
        .iter()
        .enumerate()
        .map(|(index, c)| {
            decrypt_value(c, private_key).map_err(|e| match e {
                RsaError::InvalidBlock(detail) => RsaError::InvalidBlock(format!("block {}: {}", index, detail)),
                other => other,
            })
        })
        .collect::<RsaResult<Vec<_>>>()?;

    blocks_from_values(values, &private_key.n, byte_length)
}

/// Decrypt ciphertext blocks into bytes
pub fn decrypt_bytes(
    encrypted: &[RsaBigInt],
    private_key: &RsaPrivateKey,
    byte_length: Option<usize>,
) -> RsaResult<Vec<u8>> {
    let blocks = decrypt_blocks(encrypted, private_key, byte_length)?;
    decode(&blocks)
}

/// Decrypt ciphertext blocks to a string
pub fn decrypt_to_string(
    encrypted: &[RsaBigInt],
    private_key: &RsaPrivateKey,
    byte_length: Option<usize>,
) -> RsaResult<String> {
    let plaintext = decrypt_bytes(encrypted, private_key, byte_length)?;
    String::from_utf8(plaintext).map_err(|e| {
        RsaError::InvalidBlock(format!("decrypted bytes are not valid UTF-8 (wrong key?): {}", e))
    })
}
