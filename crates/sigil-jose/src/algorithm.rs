//! JWA algorithm registry.
//!
//! Maps algorithm identifier strings (RFC 7518 plus the draft-era
//! `AxxxCBC+HSxxx` composite names) to typed descriptors carrying the
//! algorithm family, hash function, and key-size requirements.
//!
//! The `none` signature algorithm parses like any other identifier but is
//! rejected at sign/verify time unless the caller's [`JwsPolicy`] allows it
//! explicitly. The policy travels with the verifier instance, never through
//! global state, so concurrent callers with different policies cannot
//! interfere.

use serde::{Deserialize, Serialize};

use crate::error::JoseError;

/// Hash functions used by JWS/JWE algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,

    /// SHA-384.
    #[serde(rename = "SHA384")]
    Sha384,

    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
}

impl HashAlgorithm {
    /// Returns the digest length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// Signature algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureFamily {
    /// Unsecured JWS (`alg=none`).
    None,
    /// HMAC with SHA-2.
    Hmac,
    /// RSASSA-PKCS1-v1_5.
    RsaPkcs1,
    /// RSASSA-PSS.
    RsaPss,
    /// ECDSA over a NIST curve.
    Ecdsa,
}

/// Elliptic curves used by the ECDSA algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EllipticCurve {
    /// NIST P-256 (secp256r1).
    #[serde(rename = "P-256")]
    P256,

    /// NIST P-384 (secp384r1).
    #[serde(rename = "P-384")]
    P384,

    /// NIST P-521 (secp521r1).
    #[serde(rename = "P-521")]
    P521,
}

impl EllipticCurve {
    /// Returns the curve name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Returns the fixed coordinate length in bytes.
    ///
    /// JWS ECDSA signatures are `r || s` at exactly twice this length.
    #[must_use]
    pub const fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

/// JWS signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Unsecured JWS. Disabled unless the policy allows it.
    #[serde(rename = "none")]
    None,

    /// HMAC with SHA-256.
    #[serde(rename = "HS256")]
    Hs256,
    /// HMAC with SHA-384.
    #[serde(rename = "HS384")]
    Hs384,
    /// HMAC with SHA-512.
    #[serde(rename = "HS512")]
    Hs512,

    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    #[serde(rename = "RS384")]
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    #[serde(rename = "RS512")]
    Rs512,

    /// RSASSA-PSS with SHA-256.
    #[serde(rename = "PS256")]
    Ps256,
    /// RSASSA-PSS with SHA-384.
    #[serde(rename = "PS384")]
    Ps384,
    /// RSASSA-PSS with SHA-512.
    #[serde(rename = "PS512")]
    Ps512,

    /// ECDSA with P-256 and SHA-256.
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA with P-384 and SHA-384.
    #[serde(rename = "ES384")]
    Es384,
    /// ECDSA with P-521 and SHA-512.
    #[serde(rename = "ES512")]
    Es512,
}

impl SignatureAlgorithm {
    /// Returns the JWA identifier.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
        }
    }

    /// Returns the algorithm family.
    #[must_use]
    pub const fn family(self) -> SignatureFamily {
        match self {
            Self::None => SignatureFamily::None,
            Self::Hs256 | Self::Hs384 | Self::Hs512 => SignatureFamily::Hmac,
            Self::Rs256 | Self::Rs384 | Self::Rs512 => SignatureFamily::RsaPkcs1,
            Self::Ps256 | Self::Ps384 | Self::Ps512 => SignatureFamily::RsaPss,
            Self::Es256 | Self::Es384 | Self::Es512 => SignatureFamily::Ecdsa,
        }
    }

    /// Returns the hash function, or `None` for the unsecured algorithm.
    #[must_use]
    pub const fn hash_algorithm(self) -> Option<HashAlgorithm> {
        match self {
            Self::None => None,
            Self::Hs256 | Self::Rs256 | Self::Ps256 | Self::Es256 => Some(HashAlgorithm::Sha256),
            Self::Hs384 | Self::Rs384 | Self::Ps384 | Self::Es384 => Some(HashAlgorithm::Sha384),
            Self::Hs512 | Self::Rs512 | Self::Ps512 | Self::Es512 => Some(HashAlgorithm::Sha512),
        }
    }

    /// Returns the curve for ECDSA algorithms.
    #[must_use]
    pub const fn curve(self) -> Option<EllipticCurve> {
        match self {
            Self::Es256 => Some(EllipticCurve::P256),
            Self::Es384 => Some(EllipticCurve::P384),
            Self::Es512 => Some(EllipticCurve::P521),
            _ => None,
        }
    }

    /// Returns whether this is an HMAC algorithm.
    #[must_use]
    pub const fn is_hmac(self) -> bool {
        matches!(self.family(), SignatureFamily::Hmac)
    }

    /// Returns whether this is an RSA algorithm (PKCS#1 or PSS).
    #[must_use]
    pub const fn is_rsa(self) -> bool {
        matches!(
            self.family(),
            SignatureFamily::RsaPkcs1 | SignatureFamily::RsaPss
        )
    }

    /// Returns whether this is an ECDSA algorithm.
    #[must_use]
    pub const fn is_ecdsa(self) -> bool {
        matches!(self.family(), SignatureFamily::Ecdsa)
    }

    /// Returns whether signatures are reproducible for a given input.
    ///
    /// RSA-PSS and ECDSA use per-signature randomness; verification must
    /// never compare against a previously produced signature.
    #[must_use]
    pub const fn is_deterministic(self) -> bool {
        matches!(
            self.family(),
            SignatureFamily::Hmac | SignatureFamily::RsaPkcs1 | SignatureFamily::None
        )
    }

    /// Parses a JWA identifier.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnsupportedAlgorithm`] for unknown identifiers.
    pub fn from_jwa(name: &str) -> Result<Self, JoseError> {
        match name {
            "none" => Ok(Self::None),
            "HS256" => Ok(Self::Hs256),
            "HS384" => Ok(Self::Hs384),
            "HS512" => Ok(Self::Hs512),
            "RS256" => Ok(Self::Rs256),
            "RS384" => Ok(Self::Rs384),
            "RS512" => Ok(Self::Rs512),
            "PS256" => Ok(Self::Ps256),
            "PS384" => Ok(Self::Ps384),
            "PS512" => Ok(Self::Ps512),
            "ES256" => Ok(Self::Es256),
            "ES384" => Ok(Self::Es384),
            "ES512" => Ok(Self::Es512),
            _ => Err(JoseError::UnsupportedAlgorithm(name.to_string())),
        }
    }
}

/// Policy flags threaded through JWS signers and verifiers.
///
/// The default policy rejects `alg=none`. Callers that genuinely need
/// unsecured JWS (interop test rigs) construct a permissive instance and
/// keep its scope as small as possible.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwsPolicy {
    allow_none: bool,
}

impl JwsPolicy {
    /// Returns a policy that permits `alg=none`.
    #[must_use]
    pub const fn permissive() -> Self {
        Self { allow_none: true }
    }

    /// Returns whether the given algorithm may be used under this policy.
    #[must_use]
    pub const fn permits(self, algorithm: SignatureAlgorithm) -> bool {
        match algorithm {
            SignatureAlgorithm::None => self.allow_none,
            _ => true,
        }
    }

    /// Rejects algorithms this policy does not permit.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnsupportedAlgorithm`] for a disabled algorithm.
    pub fn check(self, algorithm: SignatureAlgorithm) -> Result<(), JoseError> {
        if self.permits(algorithm) {
            Ok(())
        } else {
            Err(JoseError::UnsupportedAlgorithm(
                algorithm.jwa_name().to_string(),
            ))
        }
    }
}

/// JWE key-management algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyManagementFamily {
    /// RSAES-PKCS1-v1_5 key transport.
    RsaPkcs1,
    /// RSAES-OAEP key transport.
    RsaOaep,
    /// AES Key Wrap with a shared symmetric key.
    AesKeyWrap,
}

/// JWE key-management algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyManagementAlgorithm {
    /// RSAES-PKCS1-v1_5.
    #[serde(rename = "RSA1_5")]
    Rsa1_5,

    /// RSAES-OAEP with SHA-1 and MGF1-SHA-1.
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,

    /// RSAES-OAEP with SHA-256 and MGF1-SHA-256.
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaep256,

    /// AES-128 Key Wrap.
    #[serde(rename = "A128KW")]
    A128Kw,

    /// AES-192 Key Wrap.
    #[serde(rename = "A192KW")]
    A192Kw,

    /// AES-256 Key Wrap.
    #[serde(rename = "A256KW")]
    A256Kw,
}

impl KeyManagementAlgorithm {
    /// Returns the JWA identifier.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::Rsa1_5 => "RSA1_5",
            Self::RsaOaep => "RSA-OAEP",
            Self::RsaOaep256 => "RSA-OAEP-256",
            Self::A128Kw => "A128KW",
            Self::A192Kw => "A192KW",
            Self::A256Kw => "A256KW",
        }
    }

    /// Returns the algorithm family.
    #[must_use]
    pub const fn family(self) -> KeyManagementFamily {
        match self {
            Self::Rsa1_5 => KeyManagementFamily::RsaPkcs1,
            Self::RsaOaep | Self::RsaOaep256 => KeyManagementFamily::RsaOaep,
            Self::A128Kw | Self::A192Kw | Self::A256Kw => KeyManagementFamily::AesKeyWrap,
        }
    }

    /// Returns the key-encryption-key length for AES-KW algorithms.
    #[must_use]
    pub const fn kek_len(self) -> Option<usize> {
        match self {
            Self::A128Kw => Some(16),
            Self::A192Kw => Some(24),
            Self::A256Kw => Some(32),
            _ => None,
        }
    }

    /// Parses a JWA identifier.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnsupportedAlgorithm`] for unknown identifiers.
    pub fn from_jwa(name: &str) -> Result<Self, JoseError> {
        match name {
            "RSA1_5" => Ok(Self::Rsa1_5),
            "RSA-OAEP" => Ok(Self::RsaOaep),
            "RSA-OAEP-256" => Ok(Self::RsaOaep256),
            "A128KW" => Ok(Self::A128Kw),
            "A192KW" => Ok(Self::A192Kw),
            "A256KW" => Ok(Self::A256Kw),
            _ => Err(JoseError::UnsupportedAlgorithm(name.to_string())),
        }
    }
}

/// JWE content-encryption algorithms.
///
/// The `...CbcPlusHs...` variants are the draft-era composite names
/// (`A128CBC+HS256`). They differ from the RFC 7518 forms in the order the
/// CEK is split: the composites put the encryption half first and the MAC
/// half second, RFC 7518 is the reverse. Both are registered as distinct
/// algorithms so a token is never silently reinterpreted under the wrong
/// split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentEncryptionAlgorithm {
    /// AES-128 GCM.
    #[serde(rename = "A128GCM")]
    A128Gcm,

    /// AES-192 GCM.
    #[serde(rename = "A192GCM")]
    A192Gcm,

    /// AES-256 GCM.
    #[serde(rename = "A256GCM")]
    A256Gcm,

    /// AES-128 CBC with HMAC-SHA-256 (RFC 7518).
    #[serde(rename = "A128CBC-HS256")]
    A128CbcHs256,

    /// AES-192 CBC with HMAC-SHA-384 (RFC 7518).
    #[serde(rename = "A192CBC-HS384")]
    A192CbcHs384,

    /// AES-256 CBC with HMAC-SHA-512 (RFC 7518).
    #[serde(rename = "A256CBC-HS512")]
    A256CbcHs512,

    /// AES-128 CBC with HMAC-SHA-256, draft-era composite split.
    #[serde(rename = "A128CBC+HS256")]
    A128CbcPlusHs256,

    /// AES-256 CBC with HMAC-SHA-512, draft-era composite split.
    #[serde(rename = "A256CBC+HS512")]
    A256CbcPlusHs512,
}

impl ContentEncryptionAlgorithm {
    /// Returns the JWA identifier.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A192Gcm => "A192GCM",
            Self::A256Gcm => "A256GCM",
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A192CbcHs384 => "A192CBC-HS384",
            Self::A256CbcHs512 => "A256CBC-HS512",
            Self::A128CbcPlusHs256 => "A128CBC+HS256",
            Self::A256CbcPlusHs512 => "A256CBC+HS512",
        }
    }

    /// Returns the content-encryption-key length in bytes.
    ///
    /// CBC-HMAC algorithms need a double-length key: one half encrypts,
    /// the other authenticates.
    #[must_use]
    pub const fn cek_len(self) -> usize {
        match self {
            Self::A128Gcm => 16,
            Self::A192Gcm => 24,
            Self::A256Gcm => 32,
            Self::A128CbcHs256 | Self::A128CbcPlusHs256 => 32,
            Self::A192CbcHs384 => 48,
            Self::A256CbcHs512 | Self::A256CbcPlusHs512 => 64,
        }
    }

    /// Returns the IV length in bytes.
    #[must_use]
    pub const fn iv_len(self) -> usize {
        if self.is_gcm() {
            12
        } else {
            16
        }
    }

    /// Returns the authentication-tag length in bytes.
    #[must_use]
    pub const fn tag_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A192Gcm | Self::A256Gcm => 16,
            Self::A128CbcHs256 | Self::A128CbcPlusHs256 => 16,
            Self::A192CbcHs384 => 24,
            Self::A256CbcHs512 | Self::A256CbcPlusHs512 => 32,
        }
    }

    /// Returns whether this is an AES-GCM algorithm.
    #[must_use]
    pub const fn is_gcm(self) -> bool {
        matches!(self, Self::A128Gcm | Self::A192Gcm | Self::A256Gcm)
    }

    /// Returns whether the CEK split puts the encryption half first.
    #[must_use]
    pub const fn legacy_split(self) -> bool {
        matches!(self, Self::A128CbcPlusHs256 | Self::A256CbcPlusHs512)
    }

    /// Returns the MAC hash for CBC-HMAC algorithms.
    #[must_use]
    pub const fn mac_hash(self) -> Option<HashAlgorithm> {
        match self {
            Self::A128CbcHs256 | Self::A128CbcPlusHs256 => Some(HashAlgorithm::Sha256),
            Self::A192CbcHs384 => Some(HashAlgorithm::Sha384),
            Self::A256CbcHs512 | Self::A256CbcPlusHs512 => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Parses a JWA identifier.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnsupportedAlgorithm`] for unknown identifiers.
    pub fn from_jwa(name: &str) -> Result<Self, JoseError> {
        match name {
            "A128GCM" => Ok(Self::A128Gcm),
            "A192GCM" => Ok(Self::A192Gcm),
            "A256GCM" => Ok(Self::A256Gcm),
            "A128CBC-HS256" => Ok(Self::A128CbcHs256),
            "A192CBC-HS384" => Ok(Self::A192CbcHs384),
            "A256CBC-HS512" => Ok(Self::A256CbcHs512),
            "A128CBC+HS256" => Ok(Self::A128CbcPlusHs256),
            "A256CBC+HS512" => Ok(Self::A256CbcPlusHs512),
            _ => Err(JoseError::UnsupportedAlgorithm(name.to_string())),
        }
    }
}
