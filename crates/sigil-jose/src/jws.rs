//! Compact JWS: parse, sign, verify.
//!
//! Parse and verify are separate operations. [`CompactJws::parse`] checks
//! structure only (segment count, base64url, header JSON, and that the
//! signature segment's presence matches the declared `alg`) and exposes
//! header and payload claims without validating anything cryptographic.
//! Verification happens against an explicit key source afterwards.
//!
//! A mismatched signature is reported as `Ok(false)`; errors are reserved
//! for malformed input and missing keys, so callers can distinguish "this
//! token is forged" from "I don't have the key yet".

use aws_lc_rs::{hmac, signature as awssig};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::algorithm::{JwsPolicy, SignatureAlgorithm, SignatureFamily};
use crate::error::{JoseError, JoseResult};
use crate::jwk::{JsonWebKey, JsonWebKeySet};
use crate::keys::{KeyStore, ServerKey};

/// JOSE header of a signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Signature algorithm identifier.
    pub alg: String,

    /// Token type, normally `JWT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key ID of the signing key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Content type of the payload (`JWT` for nested tokens).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
}

impl JwsHeader {
    /// Creates a header for the given algorithm with `typ: JWT`.
    #[must_use]
    pub fn new(algorithm: SignatureAlgorithm) -> Self {
        Self {
            alg: algorithm.jwa_name().to_string(),
            typ: Some("JWT".to_string()),
            kid: None,
            cty: None,
        }
    }

    /// Sets the key ID.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Parses the declared algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::UnsupportedAlgorithm`] for unknown identifiers.
    pub fn algorithm(&self) -> JoseResult<SignatureAlgorithm> {
        SignatureAlgorithm::from_jwa(&self.alg)
    }
}

/// A parsed, not-yet-verified compact JWS.
#[derive(Debug, Clone)]
pub struct CompactJws {
    header: JwsHeader,
    signing_input: String,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

impl CompactJws {
    /// Parses a compact-serialized JWS.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::Malformed`] if the token does not have exactly
    /// three segments, a segment is not base64url, the header is not JSON,
    /// or the signature segment's presence contradicts the declared `alg`
    /// (`none` requires an empty signature, everything else a non-empty
    /// one).
    pub fn parse(token: &str) -> JoseResult<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(JoseError::Malformed(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        let header_bytes = URL_SAFE_NO_PAD
            .decode(segments[0])
            .map_err(|_| JoseError::Malformed("header is not base64url".to_string()))?;
        let header: JwsHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| JoseError::Malformed("header is not valid JSON".to_string()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(segments[1])
            .map_err(|_| JoseError::Malformed("payload is not base64url".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(segments[2])
            .map_err(|_| JoseError::Malformed("signature is not base64url".to_string()))?;

        let algorithm = header.algorithm()?;
        match (algorithm, signature.is_empty()) {
            (SignatureAlgorithm::None, false) => {
                return Err(JoseError::Malformed(
                    "unsecured JWS must have an empty signature segment".to_string(),
                ));
            }
            (SignatureAlgorithm::None, true) => {}
            (_, true) => {
                return Err(JoseError::Malformed(format!(
                    "{} token is missing its signature segment",
                    header.alg
                )));
            }
            (_, false) => {}
        }

        Ok(Self {
            header,
            signing_input: format!("{}.{}", segments[0], segments[1]),
            payload,
            signature,
        })
    }

    /// Returns the parsed header.
    #[must_use]
    pub const fn header(&self) -> &JwsHeader {
        &self.header
    }

    /// Returns the raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the signing input (`header.payload` as transmitted).
    #[must_use]
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// Returns the raw signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Parses the payload as JSON claims.
    ///
    /// # Errors
    ///
    /// Returns [`JoseError::Malformed`] if the payload is not JSON.
    pub fn claims(&self) -> JoseResult<serde_json::Value> {
        serde_json::from_slice(&self.payload)
            .map_err(|_| JoseError::Malformed("payload is not valid JSON".to_string()))
    }
}

/// Key source for signing.
#[derive(Clone, Copy)]
pub enum SigningKeySource<'a> {
    /// Shared secret for HMAC algorithms.
    Secret(&'a [u8]),

    /// Keystore-resolved asymmetric key.
    Store {
        /// Keystore holding the private key.
        store: &'a KeyStore,
        /// Key ID to resolve.
        kid: &'a str,
    },

    /// A single asymmetric key.
    Key(&'a ServerKey),

    /// No key material (`alg=none` only).
    None,
}

/// Key source for verification.
#[derive(Clone, Copy)]
pub enum VerificationKeySource<'a> {
    /// Shared secret for HMAC algorithms.
    Secret(&'a [u8]),

    /// Public keys from a fetched JWK set, resolved by `kid`.
    JwkSet(&'a JsonWebKeySet),

    /// Server keystore (public halves of held key pairs).
    Store(&'a KeyStore),

    /// No key material (`alg=none` only).
    None,
}

/// Signs raw signing input.
///
/// The policy gates `alg=none`; all other algorithms are always permitted.
///
/// # Errors
///
/// Returns an error if the algorithm is disabled, the key material does
/// not fit the algorithm, or the underlying signing operation fails.
pub fn sign(
    signing_input: &[u8],
    key: &SigningKeySource<'_>,
    algorithm: SignatureAlgorithm,
    policy: JwsPolicy,
) -> JoseResult<String> {
    policy.check(algorithm)?;

    let signature = match (algorithm.family(), key) {
        (SignatureFamily::None, _) => Vec::new(),
        (SignatureFamily::Hmac, SigningKeySource::Secret(secret)) => {
            let key = hmac::Key::new(hmac_algorithm(algorithm), secret);
            hmac::sign(&key, signing_input).as_ref().to_vec()
        }
        (_, SigningKeySource::Store { store, kid }) => {
            let key = store.get(kid)?;
            check_key_algorithm(key.algorithm(), algorithm)?;
            key.sign(signing_input)?
        }
        (_, SigningKeySource::Key(key)) => {
            check_key_algorithm(key.algorithm(), algorithm)?;
            key.sign(signing_input)?
        }
        _ => {
            return Err(JoseError::InvalidKey(format!(
                "key material does not fit {}",
                algorithm.jwa_name()
            )));
        }
    };

    Ok(URL_SAFE_NO_PAD.encode(signature))
}

/// Builds a complete compact JWS over JSON claims.
///
/// The header's `kid` is filled from the keystore key when one is used.
///
/// # Errors
///
/// Returns an error if serialization or signing fails.
pub fn encode_compact(
    mut header: JwsHeader,
    claims: &serde_json::Value,
    key: &SigningKeySource<'_>,
    policy: JwsPolicy,
) -> JoseResult<String> {
    if header.kid.is_none() {
        match key {
            SigningKeySource::Store { kid, .. } => header.kid = Some((*kid).to_string()),
            SigningKeySource::Key(k) => header.kid = Some(k.key_id().to_string()),
            _ => {}
        }
    }

    let header_bytes = serde_json::to_vec(&header)
        .map_err(|e| JoseError::Signing(format!("header serialization failed: {e}")))?;
    let payload_bytes = serde_json::to_vec(claims)
        .map_err(|e| JoseError::Signing(format!("claims serialization failed: {e}")))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_bytes),
        URL_SAFE_NO_PAD.encode(payload_bytes)
    );

    let algorithm = header.algorithm()?;
    let signature = sign(signing_input.as_bytes(), key, algorithm, policy)?;

    Ok(format!("{signing_input}.{signature}"))
}

/// Verifies a signature over raw signing input.
///
/// Returns `Ok(false)` on a mismatched signature. Errors are reserved for
/// malformed input: a disabled algorithm, key material that cannot be
/// parsed, or a `kid` that is absent from the key set
/// ([`JoseError::KeyNotFound`]).
///
/// # Errors
///
/// See above; never errors merely because the signature does not match.
pub fn verify(
    signing_input: &[u8],
    signature: &[u8],
    kid: Option<&str>,
    key: &VerificationKeySource<'_>,
    algorithm: SignatureAlgorithm,
    policy: JwsPolicy,
) -> JoseResult<bool> {
    policy.check(algorithm)?;

    match algorithm.family() {
        // Unsecured JWS verifies vacuously iff the signature is absent.
        SignatureFamily::None => Ok(signature.is_empty()),

        SignatureFamily::Hmac => {
            let secret = match key {
                VerificationKeySource::Secret(secret) => *secret,
                _ => {
                    return Err(JoseError::InvalidKey(
                        "HMAC verification needs a shared secret".to_string(),
                    ));
                }
            };
            let key = hmac::Key::new(hmac_algorithm(algorithm), secret);
            // Constant-time comparison inside aws-lc-rs
            Ok(hmac::verify(&key, signing_input, signature).is_ok())
        }

        SignatureFamily::RsaPkcs1 | SignatureFamily::RsaPss => {
            let jwk = resolve_public_key(kid, key)?;
            let (n, e) = jwk.rsa_components()?;
            let components = awssig::RsaPublicKeyComponents {
                n: n.as_slice(),
                e: e.as_slice(),
            };
            Ok(components
                .verify(rsa_verification_algorithm(algorithm)?, signing_input, signature)
                .is_ok())
        }

        SignatureFamily::Ecdsa => {
            let jwk = resolve_public_key(kid, key)?;
            let point = jwk.ec_point()?;
            let public_key =
                awssig::UnparsedPublicKey::new(ecdsa_verification_algorithm(algorithm)?, &point);
            Ok(public_key.verify(signing_input, signature).is_ok())
        }
    }
}

/// Verifies a parsed token using its own header's `alg` and `kid`.
///
/// # Errors
///
/// Same contract as [`verify`].
pub fn verify_token(
    jws: &CompactJws,
    key: &VerificationKeySource<'_>,
    policy: JwsPolicy,
) -> JoseResult<bool> {
    let algorithm = jws.header().algorithm()?;
    verify(
        jws.signing_input().as_bytes(),
        jws.signature(),
        jws.header().kid.as_deref(),
        key,
        algorithm,
        policy,
    )
}

/// Resolves the public JWK for an asymmetric verification.
///
/// Without a `kid`, a set containing exactly one signing key is
/// unambiguous and that key is used; anything else is an error.
fn resolve_public_key<'a>(
    kid: Option<&str>,
    key: &'a VerificationKeySource<'_>,
) -> JoseResult<JwkRef<'a>> {
    match key {
        VerificationKeySource::JwkSet(set) => match kid {
            Some(kid) => set
                .find_key(kid)
                .map(JwkRef::Borrowed)
                .ok_or_else(|| JoseError::KeyNotFound(kid.to_string())),
            None => {
                let candidates = set.signing_keys();
                if candidates.len() == 1 {
                    Ok(JwkRef::Borrowed(candidates[0]))
                } else {
                    Err(JoseError::KeyNotFound(
                        "no kid and key set is ambiguous".to_string(),
                    ))
                }
            }
        },
        VerificationKeySource::Store(store) => {
            let kid = kid.ok_or_else(|| {
                JoseError::KeyNotFound("keystore lookup requires a kid".to_string())
            })?;
            Ok(JwkRef::Owned(store.get(kid)?.public_jwk()?))
        }
        _ => Err(JoseError::InvalidKey(
            "asymmetric verification needs a JWK set or keystore".to_string(),
        )),
    }
}

/// A resolved JWK, borrowed from a set or freshly exported from a store.
enum JwkRef<'a> {
    Borrowed(&'a JsonWebKey),
    Owned(JsonWebKey),
}

impl JwkRef<'_> {
    fn rsa_components(&self) -> JoseResult<(Vec<u8>, Vec<u8>)> {
        match self {
            Self::Borrowed(jwk) => jwk.rsa_components(),
            Self::Owned(jwk) => jwk.rsa_components(),
        }
    }

    fn ec_point(&self) -> JoseResult<Vec<u8>> {
        match self {
            Self::Borrowed(jwk) => jwk.ec_point(),
            Self::Owned(jwk) => jwk.ec_point(),
        }
    }
}

fn check_key_algorithm(
    key_algorithm: SignatureAlgorithm,
    requested: SignatureAlgorithm,
) -> JoseResult<()> {
    if key_algorithm == requested {
        Ok(())
    } else {
        Err(JoseError::InvalidKey(format!(
            "key is bound to {}, not {}",
            key_algorithm.jwa_name(),
            requested.jwa_name()
        )))
    }
}

fn hmac_algorithm(algorithm: SignatureAlgorithm) -> hmac::Algorithm {
    match algorithm {
        SignatureAlgorithm::Hs384 => hmac::HMAC_SHA384,
        SignatureAlgorithm::Hs512 => hmac::HMAC_SHA512,
        _ => hmac::HMAC_SHA256,
    }
}

fn rsa_verification_algorithm(
    algorithm: SignatureAlgorithm,
) -> JoseResult<&'static awssig::RsaParameters> {
    match algorithm {
        SignatureAlgorithm::Rs256 => Ok(&awssig::RSA_PKCS1_2048_8192_SHA256),
        SignatureAlgorithm::Rs384 => Ok(&awssig::RSA_PKCS1_2048_8192_SHA384),
        SignatureAlgorithm::Rs512 => Ok(&awssig::RSA_PKCS1_2048_8192_SHA512),
        SignatureAlgorithm::Ps256 => Ok(&awssig::RSA_PSS_2048_8192_SHA256),
        SignatureAlgorithm::Ps384 => Ok(&awssig::RSA_PSS_2048_8192_SHA384),
        SignatureAlgorithm::Ps512 => Ok(&awssig::RSA_PSS_2048_8192_SHA512),
        _ => Err(JoseError::UnsupportedAlgorithm(
            algorithm.jwa_name().to_string(),
        )),
    }
}

fn ecdsa_verification_algorithm(
    algorithm: SignatureAlgorithm,
) -> JoseResult<&'static awssig::EcdsaVerificationAlgorithm> {
    match algorithm {
        SignatureAlgorithm::Es256 => Ok(&awssig::ECDSA_P256_SHA256_FIXED),
        SignatureAlgorithm::Es384 => Ok(&awssig::ECDSA_P384_SHA384_FIXED),
        SignatureAlgorithm::Es512 => Ok(&awssig::ECDSA_P521_SHA512_FIXED),
        _ => Err(JoseError::UnsupportedAlgorithm(
            algorithm.jwa_name().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::EcdsaSigningKey;
    use serde_json::json;

    fn sample_claims() -> serde_json::Value {
        json!({"iss": "https://op.example.com", "sub": "user-1"})
    }

    #[test]
    fn hmac_sign_verify_roundtrip() {
        let secret = b"a-shared-secret-of-decent-length";
        let token = encode_compact(
            JwsHeader::new(SignatureAlgorithm::Hs256),
            &sample_claims(),
            &SigningKeySource::Secret(secret),
            JwsPolicy::default(),
        )
        .unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        let verified = verify_token(
            &jws,
            &VerificationKeySource::Secret(secret),
            JwsPolicy::default(),
        )
        .unwrap();
        assert!(verified);
    }

    #[test]
    fn hmac_wrong_secret_is_false_not_error() {
        let token = encode_compact(
            JwsHeader::new(SignatureAlgorithm::Hs256),
            &sample_claims(),
            &SigningKeySource::Secret(b"secret-one"),
            JwsPolicy::default(),
        )
        .unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        let verified = verify_token(
            &jws,
            &VerificationKeySource::Secret(b"secret-two"),
            JwsPolicy::default(),
        )
        .unwrap();
        assert!(!verified);
    }

    #[test]
    fn ecdsa_sign_verify_through_jwk_set() {
        let key = EcdsaSigningKey::generate(SignatureAlgorithm::Es256).unwrap();
        let jwks = JsonWebKeySet::with_keys(vec![key.public_jwk().unwrap()]);
        let kid = key.key_id().to_string();
        let server_key = ServerKey::Ecdsa(key);

        let token = encode_compact(
            JwsHeader::new(SignatureAlgorithm::Es256).with_kid(&kid),
            &sample_claims(),
            &SigningKeySource::Key(&server_key),
            JwsPolicy::default(),
        )
        .unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        assert_eq!(jws.header().kid.as_deref(), Some(kid.as_str()));
        assert!(verify_token(
            &jws,
            &VerificationKeySource::JwkSet(&jwks),
            JwsPolicy::default()
        )
        .unwrap());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let secret = b"tamper-test-secret";
        let token = encode_compact(
            JwsHeader::new(SignatureAlgorithm::Hs256),
            &sample_claims(),
            &SigningKeySource::Secret(secret),
            JwsPolicy::default(),
        )
        .unwrap();

        // Re-encode the payload with one claim changed, keep the signature
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[1] =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json!({"sub": "user-2"})).unwrap());
        let tampered = parts.join(".");

        let jws = CompactJws::parse(&tampered).unwrap();
        assert!(!verify_token(
            &jws,
            &VerificationKeySource::Secret(secret),
            JwsPolicy::default()
        )
        .unwrap());
    }

    #[test]
    fn none_requires_permissive_policy() {
        let result = encode_compact(
            JwsHeader::new(SignatureAlgorithm::None),
            &sample_claims(),
            &SigningKeySource::None,
            JwsPolicy::default(),
        );
        assert!(matches!(result, Err(JoseError::UnsupportedAlgorithm(_))));

        let token = encode_compact(
            JwsHeader::new(SignatureAlgorithm::None),
            &sample_claims(),
            &SigningKeySource::None,
            JwsPolicy::permissive(),
        )
        .unwrap();
        assert!(token.ends_with('.'));

        let jws = CompactJws::parse(&token).unwrap();
        // Default policy still refuses to verify it
        assert!(matches!(
            verify_token(&jws, &VerificationKeySource::None, JwsPolicy::default()),
            Err(JoseError::UnsupportedAlgorithm(_))
        ));
        assert!(verify_token(
            &jws,
            &VerificationKeySource::None,
            JwsPolicy::permissive()
        )
        .unwrap());
    }

    #[test]
    fn wrong_segment_count_is_a_parse_error() {
        assert!(matches!(
            CompactJws::parse("only.two"),
            Err(JoseError::Malformed(_))
        ));
        assert!(matches!(
            CompactJws::parse("a.b.c.d.e"),
            Err(JoseError::Malformed(_))
        ));
    }

    #[test]
    fn signed_alg_with_empty_signature_is_a_parse_error() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br"{}");
        let token = format!("{header}.{payload}.");
        assert!(matches!(
            CompactJws::parse(&token),
            Err(JoseError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_kid_is_key_not_found() {
        let key = EcdsaSigningKey::generate(SignatureAlgorithm::Es256).unwrap();
        let jwks = JsonWebKeySet::with_keys(vec![key.public_jwk().unwrap()]);
        let server_key = ServerKey::Ecdsa(key);

        let token = encode_compact(
            JwsHeader::new(SignatureAlgorithm::Es256).with_kid("other-kid"),
            &sample_claims(),
            &SigningKeySource::Key(&server_key),
            JwsPolicy::default(),
        )
        .unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        assert!(matches!(
            verify_token(&jws, &VerificationKeySource::JwkSet(&jwks), JwsPolicy::default()),
            Err(JoseError::KeyNotFound(_))
        ));
    }

    #[test]
    fn parse_exposes_claims_without_verification() {
        let token = encode_compact(
            JwsHeader::new(SignatureAlgorithm::Hs256),
            &sample_claims(),
            &SigningKeySource::Secret(b"secret"),
            JwsPolicy::default(),
        )
        .unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        let claims = jws.claims().unwrap();
        assert_eq!(claims["sub"], "user-1");
    }
}
