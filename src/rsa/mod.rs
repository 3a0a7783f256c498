// RSA Module - Main module file
// Exports all RSA-related functionality

pub mod bigint;
pub mod primes;
pub mod keygen;
pub mod codec;
pub mod encrypt;
pub mod decrypt;

pub use primes::{miller_rabin_error_probability, CancelToken, LargePrime, PrimeGenerator, PrimePair};
pub use keygen::{derive_from_pair, derive_keypair, ExponentChoice, RsaKeyPair, RsaPrivateKey, RsaPublicKey};
pub use codec::{block_byte_size, block_count, PlainBlock};
pub use encrypt::{encrypt_bytes, encrypt_string, encrypt_value, Block, EncryptionResult};
pub use decrypt::{decrypt_bytes, decrypt_to_string, decrypt_value};
