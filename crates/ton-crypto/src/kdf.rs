//! Key derivation functions.
//!
//! TON mnemonics turn a word list into an Ed25519 seed with HMAC-SHA512
//! and PBKDF2-SHA512; both are exposed here.
//!
//! ```
//! use ton_crypto::kdf::{hmac_sha512, pbkdf2_sha512};
//!
//! let entropy = hmac_sha512(b"word1 word2", b"");
//! let mut seed = [0u8; 64];
//! pbkdf2_sha512(&entropy, b"TON default seed", 1, &mut seed);
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Derive a key using PBKDF2 with HMAC-SHA512.
pub fn pbkdf2_sha512(password: &[u8], salt: &[u8], iterations: u32, output: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, output);
}

/// Compute HMAC-SHA512 of the given data.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac =
        HmacSha512::new_from_slice(key).expect("HMAC can be initialized with any key length");
    mac.update(data);
    let mut output = [0u8; 64];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}
