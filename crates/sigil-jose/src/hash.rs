//! Hash functions and the OIDC half-hash.

use aws_lc_rs::digest;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::algorithm::HashAlgorithm;

/// Computes a hash of the input data.
#[must_use]
pub fn hash(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let alg = match algorithm {
        HashAlgorithm::Sha256 => &digest::SHA256,
        HashAlgorithm::Sha384 => &digest::SHA384,
        HashAlgorithm::Sha512 => &digest::SHA512,
    };

    digest::digest(alg, data).as_ref().to_vec()
}

/// Computes a SHA-256 hash of the input data.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha256, data)
}

/// Computes a SHA-384 hash of the input data.
#[must_use]
pub fn sha384(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha384, data)
}

/// Computes a SHA-512 hash of the input data.
#[must_use]
pub fn sha512(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha512, data)
}

/// Computes the OIDC half-hash of a token artifact.
///
/// `at_hash` and `c_hash` are the base64url encoding of the left-most half
/// of the hash of the ASCII token bytes, hashed with the function matching
/// the ID Token's signing algorithm.
#[must_use]
pub fn half_hash(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let digest = hash(algorithm, data);
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lengths() {
        assert_eq!(sha256(b"test").len(), 32);
        assert_eq!(sha384(b"test").len(), 48);
        assert_eq!(sha512(b"test").len(), 64);
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(sha256(b"hello"), sha256(b"hello"));
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn half_hash_is_half_the_digest() {
        // 16 bytes of SHA-256 -> 22 base64url chars, no padding
        let encoded = half_hash(HashAlgorithm::Sha256, b"some-access-token");
        assert_eq!(encoded.len(), 22);
        assert!(!encoded.contains('='));
    }

    #[test]
    fn half_hash_known_value() {
        // at_hash example from OpenID Connect Core 3.3.2.11
        let encoded = half_hash(HashAlgorithm::Sha256, b"jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y");
        assert_eq!(encoded, "77QmUPtjPfzWtF2AnpK9RQ");
    }
}
