//! Ed25519 signatures.
//!
//! Wallet contracts and ton_proof both authenticate with Ed25519. The
//! keypair type holds secret material: it is zeroized on drop, cannot be
//! cloned, and its `Debug` output only shows the public key.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors that can occur during Ed25519 operations.
#[derive(Debug, Error)]
pub enum Ed25519Error {
    /// The provided key bytes are invalid.
    #[error("Invalid key bytes: {0}")]
    InvalidKey(String),

    /// The signature verification failed.
    #[error("Signature verification failed")]
    VerificationFailed,

    /// The signature bytes are invalid.
    #[error("Invalid signature bytes")]
    InvalidSignature,
}

/// An Ed25519 keypair for signing and verification.
///
/// # Example
/// ```
/// use ton_crypto::ed25519::Ed25519Keypair;
///
/// let keypair = Ed25519Keypair::generate();
/// let signature = keypair.sign(b"Hello, TON!");
/// assert!(keypair.verify(b"Hello, TON!", &signature).is_ok());
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Ed25519Keypair {
    /// The 32-byte seed.
    seed: [u8; 32],
    #[zeroize(skip)]
    pub public_key: [u8; 32],
    /// Zeroizes itself on drop.
    #[zeroize(skip)]
    signing_key: SigningKey,
}

impl Ed25519Keypair {
    /// Generate a new random keypair from the OS RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Create a keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&seed))
    }

    /// Create a keypair from a byte slice holding a 32-byte seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Ed25519Error> {
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            Ed25519Error::InvalidKey(format!("Expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        Self {
            seed: signing_key.to_bytes(),
            public_key: signing_key.verifying_key().to_bytes(),
            signing_key,
        }
    }

    /// Sign a message, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), Ed25519Error> {
        verify_signature(&self.public_key, message, signature)
    }

    /// Get the public key as bytes.
    pub fn public_key_bytes(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Get the seed. Callers must not persist or log it.
    pub fn seed_bytes(&self) -> &[u8; 32] {
        &self.seed
    }
}

impl fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Keypair")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

/// Verify a signature using a public key.
pub fn verify_signature(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &[u8; 64],
) -> Result<(), Ed25519Error> {
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| Ed25519Error::InvalidKey(e.to_string()))?;
    let signature = Signature::from_bytes(signature);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| Ed25519Error::VerificationFailed)
}

/// Verify a signature from byte slices of arbitrary length.
pub fn verify_signature_slice(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), Ed25519Error> {
    let pk: [u8; 32] = public_key.try_into().map_err(|_| {
        Ed25519Error::InvalidKey(format!(
            "Public key must be 32 bytes, got {}",
            public_key.len()
        ))
    })?;
    let sig: [u8; 64] = signature
        .try_into()
        .map_err(|_| Ed25519Error::InvalidSignature)?;

    verify_signature(&pk, message, &sig)
}
