//! Asymmetric key material and the server keystore.
//!
//! RSA and ECDSA key pairs are held for signing; the public half is
//! exported as a JWK for the provider's key-set document. ECDSA signatures
//! are produced in the fixed-width `r || s` form JWS requires, not ASN.1.
//!
//! Key ownership follows the engine contract: sign/verify borrow key
//! material for the duration of one call and never retain private material
//! beyond it.

use std::collections::HashMap;

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::rsa::KeySize;
use aws_lc_rs::signature::{
    self, EcdsaKeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
    ECDSA_P384_SHA384_FIXED_SIGNING, ECDSA_P521_SHA512_FIXED_SIGNING,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::algorithm::SignatureAlgorithm;
use crate::error::JoseError;
use crate::jwk::JsonWebKey;

/// RSA key pair for signing.
///
/// Covers both PKCS#1 v1.5 and PSS padding; the padding is selected by the
/// algorithm carried with the key.
pub struct RsaSigningKey {
    key_pair: RsaKeyPair,
    key_id: String,
    algorithm: SignatureAlgorithm,
}

impl RsaSigningKey {
    /// Creates an RSA signing key from a PKCS#8 DER-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the algorithm is not
    /// RSA-based.
    pub fn from_pkcs8(
        pkcs8_der: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<Self, JoseError> {
        if !algorithm.is_rsa() {
            return Err(JoseError::InvalidKey(format!(
                "{} is not an RSA algorithm",
                algorithm.jwa_name()
            )));
        }

        let key_pair = RsaKeyPair::from_pkcs8(pkcs8_der)
            .map_err(|e| JoseError::InvalidKey(format!("invalid RSA PKCS#8 key: {e}")))?;

        let key_id = generate_key_id(key_pair.public_key().as_ref());

        Ok(Self {
            key_pair,
            key_id,
            algorithm,
        })
    }

    /// Generates a fresh 2048-bit RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails or the algorithm is not
    /// RSA-based.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self, JoseError> {
        if !algorithm.is_rsa() {
            return Err(JoseError::InvalidKey(format!(
                "{} is not an RSA algorithm",
                algorithm.jwa_name()
            )));
        }

        let key_pair = RsaKeyPair::generate(KeySize::Rsa2048)
            .map_err(|e| JoseError::InvalidKey(format!("RSA key generation failed: {e}")))?;

        let key_id = generate_key_id(key_pair.public_key().as_ref());

        Ok(Self {
            key_pair,
            key_id,
            algorithm,
        })
    }

    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, JoseError> {
        let rng = SystemRandom::new();
        let mut sig = vec![0u8; self.key_pair.public_modulus_len()];

        let padding = match self.algorithm {
            SignatureAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
            SignatureAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
            SignatureAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
            SignatureAlgorithm::Ps256 => &signature::RSA_PSS_SHA256,
            SignatureAlgorithm::Ps384 => &signature::RSA_PSS_SHA384,
            SignatureAlgorithm::Ps512 => &signature::RSA_PSS_SHA512,
            _ => {
                return Err(JoseError::Signing(format!(
                    "{} not supported for RSA signing",
                    self.algorithm.jwa_name()
                )));
            }
        };

        self.key_pair
            .sign(padding, &rng, data, &mut sig)
            .map_err(|e| JoseError::Signing(format!("RSA signing failed: {e}")))?;

        Ok(sig)
    }

    /// Returns the RSA modulus and public exponent.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be parsed.
    pub fn public_components(&self) -> Result<(Vec<u8>, Vec<u8>), JoseError> {
        extract_rsa_components(self.key_pair.public_key().as_ref())
    }

    /// Returns the public key as a JWK.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be serialized.
    pub fn public_jwk(&self) -> Result<JsonWebKey, JoseError> {
        let (n, e) = self.public_components()?;
        Ok(JsonWebKey::rsa_public(&self.key_id, self.algorithm, &n, &e))
    }
}

impl std::fmt::Debug for RsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaSigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// ECDSA key pair for signing.
///
/// P-256, P-384, and P-521. Signatures are fixed-width `r || s`.
pub struct EcdsaSigningKey {
    key_pair: EcdsaKeyPair,
    key_id: String,
    algorithm: SignatureAlgorithm,
}

impl EcdsaSigningKey {
    /// Creates an ECDSA signing key from a PKCS#8 DER-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the algorithm is not
    /// ECDSA-based.
    pub fn from_pkcs8(
        pkcs8_der: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<Self, JoseError> {
        let signing_alg = ecdsa_signing_alg(algorithm)?;

        let key_pair = EcdsaKeyPair::from_pkcs8(signing_alg, pkcs8_der)
            .map_err(|e| JoseError::InvalidKey(format!("invalid ECDSA PKCS#8 key: {e}")))?;

        let key_id = generate_key_id(key_pair.public_key().as_ref());

        Ok(Self {
            key_pair,
            key_id,
            algorithm,
        })
    }

    /// Generates a fresh ECDSA key pair for the algorithm's curve.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails or the algorithm is not
    /// ECDSA-based.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self, JoseError> {
        let signing_alg = ecdsa_signing_alg(algorithm)?;
        let rng = SystemRandom::new();

        let document = EcdsaKeyPair::generate_pkcs8(signing_alg, &rng)
            .map_err(|e| JoseError::InvalidKey(format!("ECDSA key generation failed: {e}")))?;

        Self::from_pkcs8(document.as_ref(), algorithm)
    }

    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, JoseError> {
        let rng = SystemRandom::new();

        let sig = self
            .key_pair
            .sign(&rng, data)
            .map_err(|e| JoseError::Signing(format!("ECDSA signing failed: {e}")))?;

        Ok(sig.as_ref().to_vec())
    }

    /// Returns the public key as a JWK.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be serialized.
    pub fn public_jwk(&self) -> Result<JsonWebKey, JoseError> {
        let curve = self
            .algorithm
            .curve()
            .ok_or_else(|| JoseError::InvalidKey("not an ECDSA key".to_string()))?;
        let (x, y) = extract_ec_components(self.key_pair.public_key().as_ref(), curve.coordinate_len())?;
        Ok(JsonWebKey::ec_public(
            &self.key_id,
            self.algorithm,
            curve,
            &x,
            &y,
        ))
    }
}

impl std::fmt::Debug for EcdsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaSigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// A server-held signing key of either asymmetric family.
#[derive(Debug)]
pub enum ServerKey {
    /// RSA key pair.
    Rsa(RsaSigningKey),
    /// ECDSA key pair.
    Ecdsa(EcdsaSigningKey),
}

impl ServerKey {
    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        match self {
            Self::Rsa(k) => k.key_id(),
            Self::Ecdsa(k) => k.key_id(),
        }
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Rsa(k) => k.algorithm(),
            Self::Ecdsa(k) => k.algorithm(),
        }
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, JoseError> {
        match self {
            Self::Rsa(k) => k.sign(data),
            Self::Ecdsa(k) => k.sign(data),
        }
    }

    /// Returns the public key as a JWK.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be serialized.
    pub fn public_jwk(&self) -> Result<JsonWebKey, JoseError> {
        match self {
            Self::Rsa(k) => k.public_jwk(),
            Self::Ecdsa(k) => k.public_jwk(),
        }
    }
}

/// Server keystore indexed by `kid`.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: HashMap<String, ServerKey>,
}

impl KeyStore {
    /// Creates an empty keystore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key, returning its `kid`.
    pub fn add(&mut self, key: ServerKey) -> String {
        let kid = key.key_id().to_string();
        self.keys.insert(kid.clone(), key);
        kid
    }

    /// Looks up a key by `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::KeyNotFound`] if no key has that `kid`.
    pub fn get(&self, kid: &str) -> Result<&ServerKey, JoseError> {
        self.keys
            .get(kid)
            .ok_or_else(|| JoseError::KeyNotFound(kid.to_string()))
    }

    /// Returns the first key matching the given algorithm.
    #[must_use]
    pub fn key_for_algorithm(&self, algorithm: SignatureAlgorithm) -> Option<&ServerKey> {
        self.keys.values().find(|k| k.algorithm() == algorithm)
    }

    /// Exports the public halves of all keys.
    ///
    /// # Errors
    ///
    /// Returns an error if any public key cannot be serialized.
    pub fn public_jwks(&self) -> Result<crate::jwk::JsonWebKeySet, JoseError> {
        let mut set = crate::jwk::JsonWebKeySet::new();
        for key in self.keys.values() {
            set.add_key(key.public_jwk()?);
        }
        Ok(set)
    }

    /// Returns the number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn ecdsa_signing_alg(
    algorithm: SignatureAlgorithm,
) -> Result<&'static signature::EcdsaSigningAlgorithm, JoseError> {
    match algorithm {
        SignatureAlgorithm::Es256 => Ok(&ECDSA_P256_SHA256_FIXED_SIGNING),
        SignatureAlgorithm::Es384 => Ok(&ECDSA_P384_SHA384_FIXED_SIGNING),
        SignatureAlgorithm::Es512 => Ok(&ECDSA_P521_SHA512_FIXED_SIGNING),
        _ => Err(JoseError::InvalidKey(
            "not an ECDSA algorithm".to_string(),
        )),
    }
}

/// Generates a key ID from the public key bytes.
fn generate_key_id(public_key: &[u8]) -> String {
    let digest = crate::hash::sha256(public_key);
    URL_SAFE_NO_PAD.encode(&digest[..8])
}

/// Extracts RSA modulus (n) and exponent (e) from a public key encoding.
///
/// Accepts both a full `SubjectPublicKeyInfo` and a bare `RSAPublicKey`
/// SEQUENCE; producers differ on which they hand out.
fn extract_rsa_components(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), JoseError> {
    let mut pos = 0;

    if der.get(pos) != Some(&0x30) {
        return Err(JoseError::InvalidKey(
            "invalid RSA public key: expected SEQUENCE".to_string(),
        ));
    }
    pos += 1;
    pos = skip_length(der, pos)?;

    // SPKI wraps the key in an algorithm SEQUENCE and a BIT STRING;
    // a bare RSAPublicKey goes straight to the INTEGERs.
    if der.get(pos) == Some(&0x30) {
        pos += 1;
        let alg_len = read_length(der, pos)?;
        pos = skip_length(der, pos)?;
        pos += alg_len;

        if der.get(pos) != Some(&0x03) {
            return Err(JoseError::InvalidKey(
                "invalid SPKI: expected BIT STRING".to_string(),
            ));
        }
        pos += 1;
        pos = skip_length(der, pos)?;
        pos += 1; // unused-bits byte

        if der.get(pos) != Some(&0x30) {
            return Err(JoseError::InvalidKey(
                "invalid RSAPublicKey: expected SEQUENCE".to_string(),
            ));
        }
        pos += 1;
        pos = skip_length(der, pos)?;
    }

    let (n, next) = read_integer(der, pos)?;
    let (e, _) = read_integer(der, next)?;
    Ok((n, e))
}

/// Reads an ASN.1 INTEGER, stripping the sign-padding zero byte.
fn read_integer(data: &[u8], mut pos: usize) -> Result<(Vec<u8>, usize), JoseError> {
    if data.get(pos) != Some(&0x02) {
        return Err(JoseError::InvalidKey(
            "invalid RSAPublicKey: expected INTEGER".to_string(),
        ));
    }
    pos += 1;
    let len = read_length(data, pos)?;
    pos = skip_length(data, pos)?;

    let end = pos
        .checked_add(len)
        .filter(|&e| e <= data.len())
        .ok_or_else(|| JoseError::InvalidKey("truncated INTEGER".to_string()))?;

    let mut value = data[pos..end].to_vec();
    if value.first() == Some(&0) && value.len() > 1 {
        value.remove(0);
    }
    Ok((value, end))
}

/// Extracts EC x and y coordinates from a public key encoding.
///
/// The uncompressed point marker (`0x04`) locates the point whether the
/// input is an SPKI or the bare octet string.
fn extract_ec_components(der: &[u8], coord_len: usize) -> Result<(Vec<u8>, Vec<u8>), JoseError> {
    let expected = 1 + coord_len * 2;
    let point_start = der
        .iter()
        .enumerate()
        .position(|(i, &b)| b == 0x04 && der.len() - i == expected)
        .ok_or_else(|| JoseError::InvalidKey("EC point marker not found".to_string()))?;

    let x = der[point_start + 1..point_start + 1 + coord_len].to_vec();
    let y = der[point_start + 1 + coord_len..point_start + expected].to_vec();
    Ok((x, y))
}

/// Reads an ASN.1 length field and returns the length value.
fn read_length(data: &[u8], pos: usize) -> Result<usize, JoseError> {
    let first = *data
        .get(pos)
        .ok_or_else(|| JoseError::InvalidKey("unexpected end of key data".to_string()))?;

    if first < 0x80 {
        Ok(first as usize)
    } else {
        let num_bytes = (first & 0x7F) as usize;
        if num_bytes > 4 {
            return Err(JoseError::InvalidKey("length too large".to_string()));
        }
        let mut len = 0usize;
        for i in 0..num_bytes {
            let byte = *data
                .get(pos + 1 + i)
                .ok_or_else(|| JoseError::InvalidKey("unexpected end of length".to_string()))?;
            len = (len << 8) | (byte as usize);
        }
        Ok(len)
    }
}

/// Skips an ASN.1 length field and returns the new position.
fn skip_length(data: &[u8], pos: usize) -> Result<usize, JoseError> {
    let first = *data
        .get(pos)
        .ok_or_else(|| JoseError::InvalidKey("unexpected end of key data".to_string()))?;

    if first < 0x80 {
        Ok(pos + 1)
    } else {
        let num_bytes = (first & 0x7F) as usize;
        Ok(pos + 1 + num_bytes)
    }
}
