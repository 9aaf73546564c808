//! TON mnemonic key derivation
//!
//! TON wallets do not use the BIP39 checksum. The phrase (words joined by
//! single spaces) keys an HMAC-SHA512 over the optional password; the
//! resulting entropy is stretched with PBKDF2-SHA512 into the Ed25519 seed.
//! A phrase is a "basic seed" when a cheap PBKDF2 pass over the same entropy
//! starts with a zero byte, which is how wallet apps tell a phrase was
//! generated without a password.

use std::fmt;

use ton_crypto::{Ed25519Keypair, hmac_sha512, pbkdf2_sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{WalletError, WalletResult};

/// Number of words in a TON mnemonic.
pub const MNEMONIC_WORDS: usize = 24;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SEED_SALT: &[u8] = b"TON default seed";
const BASIC_SEED_SALT: &[u8] = b"TON seed version";
const BASIC_SEED_ITERATIONS: u32 = PBKDF2_ITERATIONS / 256;

/// Mnemonic phrase for wallet key derivation
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Mnemonic {
    words: Vec<String>,
}

impl Mnemonic {
    /// Parse a whitespace separated phrase.
    pub fn from_phrase(phrase: &str) -> WalletResult<Self> {
        Self::from_words(phrase.split_whitespace())
    }

    /// Build a mnemonic from individual words. Words are lowercased; each must
    /// be plain ASCII letters.
    pub fn from_words<I, S>(words: I) -> WalletResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_ascii_lowercase())
            .collect();

        if words.len() != MNEMONIC_WORDS {
            return Err(WalletError::WrongWordCount(words.len()));
        }

        if let Some(position) = words
            .iter()
            .position(|w| w.is_empty() || !w.bytes().all(|b| b.is_ascii_lowercase()))
        {
            return Err(WalletError::InvalidMnemonic(format!(
                "word {} is not a plain lowercase word",
                position + 1
            )));
        }

        Ok(Self { words })
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Words joined by single spaces. Treat the result as secret.
    pub fn to_phrase(&self) -> String {
        self.words.join(" ")
    }

    fn entropy(&self, password: &str) -> [u8; 64] {
        let mut phrase = self.to_phrase();
        let entropy = hmac_sha512(phrase.as_bytes(), password.as_bytes());
        phrase.zeroize();
        entropy
    }

    /// True when the phrase was generated without a password.
    pub fn is_basic_seed(&self) -> bool {
        let mut entropy = self.entropy("");
        let mut check = [0u8; 64];
        pbkdf2_sha512(&entropy, BASIC_SEED_SALT, BASIC_SEED_ITERATIONS, &mut check);
        entropy.zeroize();
        check[0] == 0
    }

    /// Derive the 64-byte seed; the first half is the Ed25519 private seed.
    pub fn to_seed(&self, password: &str) -> [u8; 64] {
        let mut entropy = self.entropy(password);
        let mut seed = [0u8; 64];
        pbkdf2_sha512(&entropy, SEED_SALT, PBKDF2_ITERATIONS, &mut seed);
        entropy.zeroize();
        seed
    }

    /// Derive the wallet keypair.
    pub fn to_keypair(&self) -> Ed25519Keypair {
        self.to_keypair_with_password("")
    }

    pub fn to_keypair_with_password(&self, password: &str) -> Ed25519Keypair {
        let mut seed = self.to_seed(password);
        let mut private = [0u8; 32];
        private.copy_from_slice(&seed[..32]);
        let keypair = Ed25519Keypair::from_seed(private);
        seed.zeroize();
        private.zeroize();
        keypair
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &"[REDACTED]")
            .finish()
    }
}
