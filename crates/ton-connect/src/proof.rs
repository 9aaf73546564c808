//! `ton_proof` challenge responses.
//!
//! A wallet proves control of an address by signing a server nonce bound to
//! the address, the requesting domain and a timestamp:
//!
//! ```text
//! message   = "ton-proof-item-v2/" ++ workchain:i32be ++ hash:32
//!             ++ domain_len:u32le ++ domain ++ timestamp:u64le ++ payload
//! signed    = sha256(0xffff ++ "ton-connect" ++ sha256(message))
//! ```

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use ton_cell::Address;
use ton_crypto::{Ed25519Keypair, sha256, sha256_multi, verify_signature_slice};

use crate::error::{AuthError, AuthResult};

const PROOF_PREFIX: &[u8] = b"ton-proof-item-v2/";
const CONNECT_PREFIX: &[u8] = b"ton-connect";

/// Server-issued single-use challenge.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    pub fn new(value: impl Into<String>) -> AuthResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(AuthError::NonceUnavailable("backend returned an empty nonce".into()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nonce {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Nonce::new(value)
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.0)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDomain {
    #[serde(rename = "lengthBytes")]
    pub length_bytes: u32,
    pub value: String,
}

impl ProofDomain {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            length_bytes: value.len() as u32,
            value,
        }
    }
}

/// The `connectItems.tonProof.proof` object returned by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonProof {
    pub timestamp: u64,
    pub domain: ProofDomain,
    /// Echo of the nonce.
    pub payload: String,
    /// Base64 Ed25519 signature.
    pub signature: String,
    #[serde(rename = "stateInit", default, skip_serializing_if = "Option::is_none")]
    pub state_init: Option<String>,
}

impl TonProof {
    pub fn signature_bytes(&self) -> AuthResult<Vec<u8>> {
        STANDARD
            .decode(&self.signature)
            .map_err(|e| AuthError::StructuralProof(format!("signature is not base64: {e}")))
    }
}

/// Build the message a wallet signs for `address` on `domain`.
pub fn proof_message(address: &Address, domain: &str, timestamp: u64, payload: &str) -> Vec<u8> {
    let mut message =
        Vec::with_capacity(PROOF_PREFIX.len() + 4 + 32 + 4 + domain.len() + 8 + payload.len());
    message.extend_from_slice(PROOF_PREFIX);
    message.extend_from_slice(&(address.workchain as i32).to_be_bytes());
    message.extend_from_slice(&address.hash);
    message.extend_from_slice(&(domain.len() as u32).to_le_bytes());
    message.extend_from_slice(domain.as_bytes());
    message.extend_from_slice(&timestamp.to_le_bytes());
    message.extend_from_slice(payload.as_bytes());
    message
}

/// Digest the Ed25519 signature is computed over.
pub fn signing_digest(message: &[u8]) -> [u8; 32] {
    sha256_multi(&[&[0xff, 0xff], CONNECT_PREFIX, &sha256(message)])
}

/// Produce a proof for `payload` with a local key.
pub fn sign_proof(
    keypair: &Ed25519Keypair,
    address: &Address,
    domain: &str,
    timestamp: u64,
    payload: &str,
) -> TonProof {
    let message = proof_message(address, domain, timestamp, payload);
    let signature = keypair.sign(&signing_digest(&message));
    TonProof {
        timestamp,
        domain: ProofDomain::new(domain),
        payload: payload.to_string(),
        signature: STANDARD.encode(signature),
        state_init: None,
    }
}

/// Check a proof's signature against `public_key`.
pub fn verify_proof(proof: &TonProof, address: &Address, public_key: &[u8]) -> AuthResult<()> {
    if proof.domain.length_bytes as usize != proof.domain.value.len() {
        return Err(AuthError::StructuralProof(format!(
            "domain length {} does not match {:?}",
            proof.domain.length_bytes, proof.domain.value
        )));
    }
    let signature = proof.signature_bytes()?;
    let message = proof_message(address, &proof.domain.value, proof.timestamp, &proof.payload);
    verify_signature_slice(public_key, &signing_digest(&message), &signature)
        .map_err(|e| AuthError::StructuralProof(format!("signature check failed: {e}")))
}
