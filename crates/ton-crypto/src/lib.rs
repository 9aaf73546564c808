//! TON Cryptography Library
//!
//! Primitives used by the wallet and connect crates:
//!
//! - **Ed25519**: signing keys for wallet messages and ton_proof
//! - **SHA256**: message digests and cell hashes
//! - **KDF**: HMAC-SHA512 / PBKDF2-SHA512 for mnemonic key derivation
//!
//! # Example
//!
//! ```
//! use ton_crypto::{sha256, Ed25519Keypair, verify_signature};
//!
//! let keypair = Ed25519Keypair::generate();
//! let digest = sha256(b"Hello, TON!");
//! let signature = keypair.sign(&digest);
//! assert!(verify_signature(&keypair.public_key, &digest, &signature).is_ok());
//! ```

pub mod ed25519;
pub mod kdf;
pub mod sha256;

pub use ed25519::{Ed25519Error, Ed25519Keypair, verify_signature, verify_signature_slice};
pub use kdf::{hmac_sha512, pbkdf2_sha512};
pub use sha256::{sha256, sha256_multi};

/// Generate a cryptographically secure random 32-byte array.
pub fn random_bytes_32() -> [u8; 32] {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
