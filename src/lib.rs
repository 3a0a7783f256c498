//! Textbook RSA engine.
//!
//! Prime generation (Miller-Rabin), key derivation, block encoding and
//! block-wise encryption/decryption over `num-bigint`, with per-session
//! storage of the current primes and keys and a JSON request layer.
//!
//! There is no OAEP or PKCS#1 padding: do not use this for real confidentiality.

pub mod api;
pub mod config;
pub mod error;
pub mod rsa;
pub mod session;
pub mod util;

pub use config::ServiceConfig;
pub use error::{RsaError, RsaResult};
