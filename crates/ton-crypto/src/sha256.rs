//! SHA256 hashing.

use sha2::{Digest, Sha256};

/// Compute SHA256 hash of the input data.
///
/// # Example
/// ```
/// use ton_crypto::sha256::sha256;
///
/// let hash = sha256(b"Hello, TON!");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute SHA256 hash of several slices as if they were concatenated.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hello_ton() {
        assert_eq!(
            hex::encode(sha256(b"Hello, TON!")),
            "ae3c9bff6722168ab28def61b40ee36bb7c7dab7e29009537205192f8cd4c6d5"
        );
    }

    #[test]
    fn test_sha256_multi() {
        assert_eq!(sha256(b"HelloWorld"), sha256_multi(&[b"Hello", b"World"]));
    }
}
