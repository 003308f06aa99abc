//! Token issuance.
//!
//! Signs access tokens with the server key and ID Tokens with whatever
//! the client registered: a server asymmetric key, an HMAC over the
//! client secret, or (policy permitting) nothing. A registered
//! encryption preference nests the signed token inside a JWE addressed
//! to the client's keys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};

use sigil_jose::jwe::{self, JweRecipientKey};
use sigil_jose::jws::{self, SigningKeySource};
use sigil_jose::{
    ContentEncryptionAlgorithm, HashAlgorithm, JweHeader, JwsHeader, JwsPolicy, KeyManagementAlgorithm,
    KeyStore, KeyType, SignatureAlgorithm, SignatureFamily,
};

use crate::claims::{AccessTokenClaims, IdTokenClaims};
use crate::client::ClientMetadata;
use crate::error::{AuthorizeError, AuthorizeResult};
use crate::types::SubjectType;

/// Issuer configuration.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Issuer URL stamped into every token.
    pub issuer: String,

    /// Access token lifespan in seconds.
    pub access_token_lifespan: i64,

    /// ID token lifespan in seconds.
    pub id_token_lifespan: i64,

    /// Server signing algorithm for access tokens.
    pub signing_algorithm: SignatureAlgorithm,

    /// JWS policy applied to everything this issuer signs.
    pub policy: JwsPolicy,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            access_token_lifespan: 300,
            id_token_lifespan: 300,
            signing_algorithm: SignatureAlgorithm::Rs256,
            policy: JwsPolicy::default(),
        }
    }
}

/// Mints access tokens, ID Tokens, and UserInfo tokens.
pub struct TokenIssuer {
    config: IssuerConfig,
    keys: KeyStore,
}

impl TokenIssuer {
    /// Creates an issuer over the server keystore.
    #[must_use]
    pub const fn new(config: IssuerConfig, keys: KeyStore) -> Self {
        Self { config, keys }
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    /// Returns the issuer configuration.
    #[must_use]
    pub const fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Returns the server keystore.
    #[must_use]
    pub const fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Creates access token claims with the configured lifespan.
    #[must_use]
    pub fn new_access_token_claims(&self, subject: &str) -> AccessTokenClaims {
        AccessTokenClaims::new(
            self.config.issuer.clone(),
            subject,
            Utc::now() + Duration::seconds(self.config.access_token_lifespan),
        )
    }

    /// Creates ID token claims with the configured lifespan.
    #[must_use]
    pub fn new_id_token_claims(&self, subject: &str, client_id: &str) -> IdTokenClaims {
        IdTokenClaims::new(
            self.config.issuer.clone(),
            subject,
            client_id,
            Utc::now() + Duration::seconds(self.config.id_token_lifespan),
        )
    }

    /// Mints a signed access token with the server key.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if no key matches the configured algorithm
    /// or signing fails.
    pub fn mint_access_token(&self, claims: &AccessTokenClaims) -> AuthorizeResult<String> {
        let value = serde_json::to_value(claims)
            .map_err(|e| AuthorizeError::ServerError(e.to_string()))?;
        self.sign_with_server_key(&value, self.config.signing_algorithm)
    }

    /// Mints an ID Token per the client's registered preferences.
    ///
    /// Signed first, then nested into a JWE when the client registered
    /// ID Token encryption.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when key material for the registered
    /// algorithms is unavailable.
    pub fn mint_id_token(
        &self,
        claims: &IdTokenClaims,
        client: &ClientMetadata,
    ) -> AuthorizeResult<String> {
        let value = serde_json::to_value(claims)
            .map_err(|e| AuthorizeError::ServerError(e.to_string()))?;
        let signed = self.sign_for_client(&value, client.id_token_signed_response_alg, client)?;

        match (
            client.id_token_encrypted_response_alg,
            client.id_token_encrypted_response_enc,
        ) {
            (Some(alg), Some(enc)) => self.encrypt_for_client(signed.as_bytes(), client, alg, enc, true),
            _ => Ok(signed),
        }
    }

    /// Signs claims with a key fitting the requested algorithm.
    ///
    /// HMAC algorithms use the client secret, asymmetric algorithms the
    /// server keystore; `none` is gated by the issuer policy.
    pub(crate) fn sign_for_client(
        &self,
        claims: &serde_json::Value,
        algorithm: SignatureAlgorithm,
        client: &ClientMetadata,
    ) -> AuthorizeResult<String> {
        match algorithm.family() {
            SignatureFamily::Hmac => {
                let secret = client.secret.as_deref().ok_or_else(|| {
                    AuthorizeError::ServerError(format!(
                        "client {} has no secret for {}",
                        client.client_id,
                        algorithm.jwa_name()
                    ))
                })?;
                jws::encode_compact(
                    JwsHeader::new(algorithm),
                    claims,
                    &SigningKeySource::Secret(secret.as_bytes()),
                    self.config.policy,
                )
                .map_err(Into::into)
            }
            SignatureFamily::None => jws::encode_compact(
                JwsHeader::new(algorithm),
                claims,
                &SigningKeySource::None,
                self.config.policy,
            )
            .map_err(Into::into),
            _ => self.sign_with_server_key(claims, algorithm),
        }
    }

    fn sign_with_server_key(
        &self,
        claims: &serde_json::Value,
        algorithm: SignatureAlgorithm,
    ) -> AuthorizeResult<String> {
        let key = self.keys.key_for_algorithm(algorithm).ok_or_else(|| {
            AuthorizeError::ServerError(format!(
                "no server key for {}",
                algorithm.jwa_name()
            ))
        })?;
        jws::encode_compact(
            JwsHeader::new(algorithm),
            claims,
            &SigningKeySource::Key(key),
            self.config.policy,
        )
        .map_err(Into::into)
    }

    /// Encrypts a payload to the client's registered keys.
    pub(crate) fn encrypt_for_client(
        &self,
        payload: &[u8],
        client: &ClientMetadata,
        alg: KeyManagementAlgorithm,
        enc: ContentEncryptionAlgorithm,
        nested: bool,
    ) -> AuthorizeResult<String> {
        let mut header = JweHeader::new(alg, enc);
        if nested {
            header = header.nested();
        }

        if alg.kek_len().is_some() {
            let secret = client.secret.as_deref().ok_or_else(|| {
                AuthorizeError::ServerError(format!(
                    "client {} has no secret for {}",
                    client.client_id,
                    alg.jwa_name()
                ))
            })?;
            let kek = jwe::symmetric_kek(secret.as_bytes(), alg)?;
            jwe::encrypt(payload, &JweRecipientKey::Secret(&kek), header).map_err(Into::into)
        } else {
            let jwk = client
                .jwks
                .as_ref()
                .and_then(|set| {
                    set.encryption_keys()
                        .into_iter()
                        .find(|k| k.kty == KeyType::Rsa)
                })
                .ok_or_else(|| {
                    AuthorizeError::ServerError(format!(
                        "client {} published no RSA encryption key",
                        client.client_id
                    ))
                })?;
            if let Some(kid) = jwk.key_id() {
                header = header.with_kid(kid);
            }
            let public = jwe::rsa_public_from_jwk(jwk)?;
            jwe::encrypt(payload, &JweRecipientKey::RsaPublic(&public), header).map_err(Into::into)
        }
    }
}

/// Derives the subject identifier issued to a client.
///
/// Public subjects pass through. Pairwise subjects hash the sector
/// (host of the first registered redirect URI) with the local subject so
/// distinct sectors cannot correlate users.
#[must_use]
pub fn subject_for_client(subject: &str, client: &ClientMetadata) -> String {
    match client.subject_type {
        SubjectType::Public => subject.to_string(),
        SubjectType::Pairwise => {
            let sector = client
                .redirect_uris
                .first()
                .and_then(|uri| url::Url::parse(uri).ok())
                .and_then(|uri| uri.host_str().map(ToString::to_string))
                .unwrap_or_default();
            let digest = sigil_jose::hash::sha256(format!("{sector}:{subject}").as_bytes());
            URL_SAFE_NO_PAD.encode(digest)
        }
    }
}

/// Computes the `at_hash`/`c_hash` binding value for a token artifact.
///
/// The hash function follows the ID Token's signing algorithm; the value
/// is the base64url left half of the digest over the artifact's ASCII
/// bytes.
#[must_use]
pub fn binding_hash(id_token_alg: SignatureAlgorithm, artifact: &str) -> String {
    let hash = id_token_alg
        .hash_algorithm()
        .unwrap_or(HashAlgorithm::Sha256);
    sigil_jose::hash::half_hash(hash, artifact.as_bytes())
}
