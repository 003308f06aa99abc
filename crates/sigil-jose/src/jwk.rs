//! JSON Web Key and JWK Set types.
//!
//! Implements the key model from:
//! - [RFC 7517](https://tools.ietf.org/html/rfc7517) (JSON Web Key)
//! - [RFC 7518](https://tools.ietf.org/html/rfc7518) (JSON Web Algorithms)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::algorithm::{EllipticCurve, SignatureAlgorithm};
use crate::error::JoseError;

/// JSON Web Key Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of JSON Web Keys.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Creates a new empty JWKS.
    #[must_use]
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Creates a JWKS with the given keys.
    #[must_use]
    pub const fn with_keys(keys: Vec<JsonWebKey>) -> Self {
        Self { keys }
    }

    /// Adds a key to the set.
    pub fn add_key(&mut self, key: JsonWebKey) {
        self.keys.push(key);
    }

    /// Finds a key by its ID.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Finds keys suitable for signing.
    #[must_use]
    pub fn signing_keys(&self) -> Vec<&JsonWebKey> {
        self.keys
            .iter()
            .filter(|k| k.key_use != Some(KeyUse::Encryption))
            .collect()
    }

    /// Finds keys suitable for encryption.
    #[must_use]
    pub fn encryption_keys(&self) -> Vec<&JsonWebKey> {
        self.keys
            .iter()
            .filter(|k| k.key_use != Some(KeyUse::Signature))
            .collect()
    }
}

impl Default for JsonWebKeySet {
    fn default() -> Self {
        Self::new()
    }
}

/// Intended key use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUse {
    /// Signature verification.
    #[serde(rename = "sig")]
    Signature,

    /// Content or key encryption.
    #[serde(rename = "enc")]
    Encryption,
}

/// Key type for JWK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// RSA key.
    #[serde(rename = "RSA")]
    Rsa,

    /// Elliptic curve key.
    #[serde(rename = "EC")]
    Ec,

    /// Octet sequence (symmetric key).
    #[serde(rename = "oct")]
    Oct,
}

/// JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type.
    pub kty: KeyType,

    /// Public key use.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<KeyUse>,

    /// Algorithm intended for use with the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    // === RSA parameters ===
    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // === EC parameters ===
    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<EllipticCurve>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    // === Symmetric parameters ===
    /// Symmetric key value (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl JsonWebKey {
    /// Creates a new RSA public key.
    #[must_use]
    pub fn rsa_public(
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        modulus: &[u8],
        exponent: &[u8],
    ) -> Self {
        Self {
            kty: KeyType::Rsa,
            key_use: Some(KeyUse::Signature),
            alg: Some(algorithm.jwa_name().to_string()),
            kid: Some(kid.into()),
            n: Some(URL_SAFE_NO_PAD.encode(modulus)),
            e: Some(URL_SAFE_NO_PAD.encode(exponent)),
            crv: None,
            x: None,
            y: None,
            k: None,
        }
    }

    /// Creates a new EC public key.
    #[must_use]
    pub fn ec_public(
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        curve: EllipticCurve,
        x: &[u8],
        y: &[u8],
    ) -> Self {
        Self {
            kty: KeyType::Ec,
            key_use: Some(KeyUse::Signature),
            alg: Some(algorithm.jwa_name().to_string()),
            kid: Some(kid.into()),
            n: None,
            e: None,
            crv: Some(curve),
            x: Some(URL_SAFE_NO_PAD.encode(x)),
            y: Some(URL_SAFE_NO_PAD.encode(y)),
            k: None,
        }
    }

    /// Returns the key ID if present.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Returns the RSA modulus and exponent bytes.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::InvalidKey`] if the key is not RSA or its
    /// parameters are missing or undecodable.
    pub fn rsa_components(&self) -> Result<(Vec<u8>, Vec<u8>), JoseError> {
        if self.kty != KeyType::Rsa {
            return Err(JoseError::InvalidKey("not an RSA key".to_string()));
        }
        let n = self
            .n
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("RSA key missing 'n'".to_string()))?;
        let e = self
            .e
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("RSA key missing 'e'".to_string()))?;

        let n = URL_SAFE_NO_PAD
            .decode(n)
            .map_err(|_| JoseError::InvalidKey("RSA 'n' is not base64url".to_string()))?;
        let e = URL_SAFE_NO_PAD
            .decode(e)
            .map_err(|_| JoseError::InvalidKey("RSA 'e' is not base64url".to_string()))?;
        Ok((n, e))
    }

    /// Returns the uncompressed EC point `0x04 || x || y`.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::InvalidKey`] if the key is not EC, a coordinate
    /// is missing, or a coordinate has the wrong length for the curve.
    pub fn ec_point(&self) -> Result<Vec<u8>, JoseError> {
        if self.kty != KeyType::Ec {
            return Err(JoseError::InvalidKey("not an EC key".to_string()));
        }
        let curve = self
            .crv
            .ok_or_else(|| JoseError::InvalidKey("EC key missing 'crv'".to_string()))?;
        let x = self
            .x
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("EC key missing 'x'".to_string()))?;
        let y = self
            .y
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("EC key missing 'y'".to_string()))?;

        let x = URL_SAFE_NO_PAD
            .decode(x)
            .map_err(|_| JoseError::InvalidKey("EC 'x' is not base64url".to_string()))?;
        let y = URL_SAFE_NO_PAD
            .decode(y)
            .map_err(|_| JoseError::InvalidKey("EC 'y' is not base64url".to_string()))?;

        let len = curve.coordinate_len();
        if x.len() > len || y.len() > len {
            return Err(JoseError::InvalidKey(format!(
                "EC coordinate too long for {}",
                curve.name()
            )));
        }

        // Left-pad short coordinates; leading zero bytes are dropped by
        // some JWK producers.
        let mut point = vec![0u8; 1 + 2 * len];
        point[0] = 0x04;
        point[1 + len - x.len()..1 + len].copy_from_slice(&x);
        point[1 + 2 * len - y.len()..].copy_from_slice(&y);
        Ok(point)
    }

    /// Returns the symmetric key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::InvalidKey`] if the key is not symmetric or
    /// the value is undecodable.
    pub fn symmetric_key(&self) -> Result<Vec<u8>, JoseError> {
        if self.kty != KeyType::Oct {
            return Err(JoseError::InvalidKey("not a symmetric key".to_string()));
        }
        let k = self
            .k
            .as_deref()
            .ok_or_else(|| JoseError::InvalidKey("oct key missing 'k'".to_string()))?;
        URL_SAFE_NO_PAD
            .decode(k)
            .map_err(|_| JoseError::InvalidKey("oct 'k' is not base64url".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwks_find_key() {
        let mut jwks = JsonWebKeySet::new();
        jwks.add_key(JsonWebKey::ec_public(
            "key1",
            SignatureAlgorithm::Es256,
            EllipticCurve::P256,
            &[1; 32],
            &[2; 32],
        ));

        assert!(jwks.find_key("key1").is_some());
        assert!(jwks.find_key("key2").is_none());
    }

    #[test]
    fn ec_point_is_uncompressed() {
        let key = JsonWebKey::ec_public(
            "k",
            SignatureAlgorithm::Es256,
            EllipticCurve::P256,
            &[1; 32],
            &[2; 32],
        );
        let point = key.ec_point().unwrap();
        assert_eq!(point.len(), 65);
        assert_eq!(point[0], 0x04);
        assert_eq!(point[1], 1);
        assert_eq!(point[64], 2);
    }

    #[test]
    fn short_coordinates_are_left_padded() {
        let key = JsonWebKey::ec_public(
            "k",
            SignatureAlgorithm::Es256,
            EllipticCurve::P256,
            &[7; 31],
            &[9; 32],
        );
        let point = key.ec_point().unwrap();
        assert_eq!(point.len(), 65);
        assert_eq!(point[1], 0);
        assert_eq!(point[2], 7);
    }

    #[test]
    fn rsa_components_roundtrip() {
        let key = JsonWebKey::rsa_public("k", SignatureAlgorithm::Rs256, &[5; 256], &[1, 0, 1]);
        let (n, e) = key.rsa_components().unwrap();
        assert_eq!(n, vec![5; 256]);
        assert_eq!(e, vec![1, 0, 1]);
    }

    #[test]
    fn wrong_kty_is_invalid_key() {
        let key = JsonWebKey::rsa_public("k", SignatureAlgorithm::Rs256, &[5; 256], &[1, 0, 1]);
        assert!(matches!(key.ec_point(), Err(JoseError::InvalidKey(_))));
        assert!(matches!(key.symmetric_key(), Err(JoseError::InvalidKey(_))));
    }

    #[test]
    fn jwks_serialization_uses_jwa_names() {
        let jwks = JsonWebKeySet::with_keys(vec![JsonWebKey::ec_public(
            "key1",
            SignatureAlgorithm::Es384,
            EllipticCurve::P384,
            &[1; 48],
            &[2; 48],
        )]);

        let json = serde_json::to_string(&jwks).unwrap();
        assert!(json.contains("\"kty\":\"EC\""));
        assert!(json.contains("\"crv\":\"P-384\""));
        assert!(json.contains("\"alg\":\"ES384\""));
        assert!(json.contains("\"use\":\"sig\""));

        let parsed: JsonWebKeySet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.keys[0].kid, Some("key1".to_string()));
    }
}
