//! Request object (JAR) processing.
//!
//! An authorization request may arrive packaged as a signed and/or
//! encrypted token in the `request` parameter (or dereferenced from
//! `request_uri` by a collaborator). The key direction is inverted from
//! ID Token signing: the object is signed by the CLIENT with its secret
//! or its published keys, and encrypted to the SERVER.
//!
//! Everything that can go wrong here is `invalid_request_object`:
//! signature failure, decryption failure, a payload that is not JSON, an
//! embedded `client_id` that disagrees with the query string, or an
//! algorithm the client did not register.

use rsa::RsaPrivateKey;
use serde_json::{Map, Value};

use sigil_jose::jwe::{self, JweDecryptionKey};
use sigil_jose::jws::{self, CompactJws, VerificationKeySource};
use sigil_jose::resolver::JwksCache;
use sigil_jose::{JoseError, JsonWebKeySet, JwsPolicy, SignatureFamily};

use crate::claims::ClaimsRequest;
use crate::client::ClientMetadata;
use crate::error::AuthorizeError;
use crate::request::AuthorizationRequest;
use crate::types::parse_prompts;

/// Validates request objects against client registration metadata and
/// merges their claims into the working request.
pub struct RequestObjectProcessor<'a> {
    policy: JwsPolicy,
    server_decryption_key: Option<&'a RsaPrivateKey>,
    jwks_cache: Option<&'a JwksCache>,
}

impl<'a> RequestObjectProcessor<'a> {
    /// Creates a processor with the given JWS policy.
    #[must_use]
    pub const fn new(policy: JwsPolicy) -> Self {
        Self {
            policy,
            server_decryption_key: None,
            jwks_cache: None,
        }
    }

    /// Supplies the server's RSA decryption key for encrypted objects.
    #[must_use]
    pub const fn with_server_decryption_key(mut self, key: &'a RsaPrivateKey) -> Self {
        self.server_decryption_key = Some(key);
        self
    }

    /// Supplies the cache used to resolve `jwks_uri` client keys.
    #[must_use]
    pub const fn with_jwks_cache(mut self, cache: &'a JwksCache) -> Self {
        self.jwks_cache = Some(cache);
        self
    }

    /// Validates a request object and merges it into the outer request.
    ///
    /// Query-string values take precedence for transport parameters; the
    /// object fills in what the query string lacks, and claim constraints
    /// merge with the object authoritative per claim.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizeError::InvalidRequestObject`] on any signature,
    /// decryption, structural, or registration failure.
    pub fn process(
        &self,
        outer: &AuthorizationRequest,
        raw: &str,
        client: &ClientMetadata,
    ) -> Result<AuthorizationRequest, AuthorizeError> {
        let payload = match raw.split('.').count() {
            5 => self.decrypt_and_verify(raw, client)?,
            3 => self.verify_signed(raw, client)?,
            n => {
                return Err(AuthorizeError::InvalidRequestObject(format!(
                    "expected a compact JWS or JWE, found {n} segments"
                )));
            }
        };

        // The embedded client_id, when present, must agree with the query
        if let Some(embedded) = payload.get("client_id").and_then(Value::as_str) {
            if embedded != outer.client_id {
                return Err(AuthorizeError::InvalidRequestObject(format!(
                    "embedded client_id '{embedded}' does not match '{}'",
                    outer.client_id
                )));
            }
        }

        merge(outer, &payload)
    }

    /// Decrypts an encrypted object, verifying any nested signature.
    fn decrypt_and_verify(
        &self,
        raw: &str,
        client: &ClientMetadata,
    ) -> Result<Map<String, Value>, AuthorizeError> {
        let header = jwe::peek_header(raw).map_err(invalid_object)?;
        let alg = header.key_algorithm().map_err(invalid_object)?;
        let enc = header.content_algorithm().map_err(invalid_object)?;

        if let Some(registered) = client.request_object_encryption_alg {
            if registered != alg {
                return Err(AuthorizeError::InvalidRequestObject(format!(
                    "client did not register key-management algorithm {}",
                    alg.jwa_name()
                )));
            }
        }
        if let Some(registered) = client.request_object_encryption_enc {
            if registered != enc {
                return Err(AuthorizeError::InvalidRequestObject(format!(
                    "client did not register content-encryption algorithm {}",
                    enc.jwa_name()
                )));
            }
        }

        let kek;
        let key = if alg.kek_len().is_some() {
            let secret = client.secret.as_deref().ok_or_else(|| {
                AuthorizeError::InvalidRequestObject(
                    "client has no secret for symmetric decryption".to_string(),
                )
            })?;
            kek = jwe::symmetric_kek(secret.as_bytes(), alg).map_err(invalid_object)?;
            JweDecryptionKey::Secret(&kek)
        } else {
            let private = self.server_decryption_key.ok_or_else(|| {
                AuthorizeError::InvalidRequestObject(
                    "no server decryption key configured".to_string(),
                )
            })?;
            JweDecryptionKey::RsaPrivate(private)
        };

        let decrypted = jwe::decrypt(raw, &key).map_err(invalid_object)?;

        if decrypted.is_nested_jws() {
            let inner = std::str::from_utf8(&decrypted.plaintext).map_err(|_| {
                AuthorizeError::InvalidRequestObject("nested token is not UTF-8".to_string())
            })?;
            self.verify_signed(inner, client)
        } else {
            parse_payload(&decrypted.plaintext)
        }
    }

    /// Verifies a signed object with the client's registered mechanism.
    fn verify_signed(
        &self,
        raw: &str,
        client: &ClientMetadata,
    ) -> Result<Map<String, Value>, AuthorizeError> {
        let jws = CompactJws::parse(raw).map_err(invalid_object)?;
        let algorithm = jws.header().algorithm().map_err(invalid_object)?;

        if let Some(registered) = client.request_object_signing_alg {
            if registered != algorithm {
                return Err(AuthorizeError::InvalidRequestObject(format!(
                    "client did not register signing algorithm {}",
                    algorithm.jwa_name()
                )));
            }
        }

        let fetched;
        let key = match algorithm.family() {
            SignatureFamily::None => VerificationKeySource::None,
            SignatureFamily::Hmac => {
                let secret = client.secret.as_deref().ok_or_else(|| {
                    AuthorizeError::InvalidRequestObject(
                        "client has no secret for HMAC verification".to_string(),
                    )
                })?;
                VerificationKeySource::Secret(secret.as_bytes())
            }
            _ => {
                fetched = self.client_jwks(client)?;
                VerificationKeySource::JwkSet(&fetched)
            }
        };

        let verified = jws::verify_token(&jws, &key, self.policy).map_err(invalid_object)?;
        if !verified {
            return Err(AuthorizeError::InvalidRequestObject(
                "signature verification failed".to_string(),
            ));
        }

        parse_payload(jws.payload())
    }

    /// Resolves the client's published keys: inline set first, then the
    /// cached `jwks_uri` document.
    fn client_jwks(&self, client: &ClientMetadata) -> Result<JsonWebKeySet, AuthorizeError> {
        if let Some(jwks) = &client.jwks {
            return Ok(jwks.clone());
        }
        if let (Some(uri), Some(cache)) = (&client.jwks_uri, self.jwks_cache) {
            return cache
                .key_set(uri)
                .map(|set| (*set).clone())
                .map_err(invalid_object);
        }
        Err(AuthorizeError::InvalidRequestObject(
            "client registered no keys for asymmetric verification".to_string(),
        ))
    }
}

fn invalid_object(e: JoseError) -> AuthorizeError {
    AuthorizeError::InvalidRequestObject(e.to_string())
}

fn parse_payload(bytes: &[u8]) -> Result<Map<String, Value>, AuthorizeError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| {
        AuthorizeError::InvalidRequestObject("payload is not well-formed JSON".to_string())
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AuthorizeError::InvalidRequestObject(
            "payload is not a JSON object".to_string(),
        )),
    }
}

/// Reads a parameter that may be a string or an array of strings.
fn string_or_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s.split_whitespace().map(ToString::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Merges object claims into the outer request.
fn merge(
    outer: &AuthorizationRequest,
    payload: &Map<String, Value>,
) -> Result<AuthorizationRequest, AuthorizeError> {
    let mut merged = outer.clone();
    merged.request = None;
    merged.request_uri = None;

    if merged.redirect_uri.is_none() {
        if let Some(uri) = payload.get("redirect_uri").and_then(Value::as_str) {
            merged.redirect_uri = Some(uri.to_string());
        }
    }
    if merged.state.is_none() {
        if let Some(state) = payload.get("state").and_then(Value::as_str) {
            merged.state = Some(state.to_string());
        }
    }
    if merged.nonce.is_none() {
        if let Some(nonce) = payload.get("nonce").and_then(Value::as_str) {
            merged.nonce = Some(nonce.to_string());
        }
    }
    if merged.max_age.is_none() {
        if let Some(seconds) = payload.get("max_age").and_then(Value::as_i64) {
            merged.max_age = Some(seconds);
        }
    }
    if merged.login_hint.is_none() {
        if let Some(hint) = payload.get("login_hint").and_then(Value::as_str) {
            merged.login_hint = Some(hint.to_string());
        }
    }
    if merged.scope.is_empty() {
        if let Some(scope) = payload.get("scope") {
            merged.scope = string_or_list(scope);
        }
    }
    if merged.acr_values.is_empty() {
        if let Some(values) = payload.get("acr_values") {
            merged.acr_values = string_or_list(values);
        }
    }
    if merged.ui_locales.is_empty() {
        if let Some(locales) = payload.get("ui_locales") {
            merged.ui_locales = string_or_list(locales);
        }
    }
    if merged.prompt.is_empty() {
        if let Some(prompt) = payload.get("prompt") {
            merged.prompt = parse_prompts(&string_or_list(prompt).join(" "))?;
        }
    }

    if let Some(claims_value) = payload.get("claims") {
        let object_claims = ClaimsRequest::from_json(claims_value).map_err(|_| {
            AuthorizeError::InvalidRequestObject("claims member is malformed".to_string())
        })?;
        match &mut merged.claims {
            Some(existing) => existing.merge_from(&object_claims),
            None => merged.claims = Some(object_claims),
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ClaimRequest;
    use serde_json::json;
    use sigil_jose::jwe::JweRecipientKey;
    use sigil_jose::jws::SigningKeySource;
    use sigil_jose::{
        ContentEncryptionAlgorithm, JweHeader, JwsHeader, KeyManagementAlgorithm,
        SignatureAlgorithm,
    };

    const SECRET: &str = "a-confidential-client-secret";

    fn client() -> ClientMetadata {
        ClientMetadata::new("client-1")
            .with_secret(SECRET)
            .with_request_object_alg(SignatureAlgorithm::Hs256)
    }

    fn outer() -> AuthorizationRequest {
        AuthorizationRequest::builder("client-1", "code".parse().unwrap())
            .redirect_uri("https://rp.example.com/cb")
            .scope(["openid"])
            .state("outer-state")
            .build()
            .unwrap()
    }

    fn signed_object(payload: &Value) -> String {
        jws::encode_compact(
            JwsHeader::new(SignatureAlgorithm::Hs256),
            payload,
            &SigningKeySource::Secret(SECRET.as_bytes()),
            JwsPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn signed_object_merges_into_request() {
        let object = signed_object(&json!({
            "client_id": "client-1",
            "nonce": "object-nonce",
            "max_age": 3600,
            "claims": {"userinfo": {"email": {"essential": true}}},
        }));

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        let merged = processor.process(&outer(), &object, &client()).unwrap();

        assert_eq!(merged.nonce.as_deref(), Some("object-nonce"));
        assert_eq!(merged.max_age, Some(3600));
        // Query-string transport parameters keep precedence
        assert_eq!(merged.state.as_deref(), Some("outer-state"));
        assert!(merged.request.is_none());
        assert!(merged
            .claims
            .unwrap()
            .userinfo_claim("email")
            .unwrap()
            .essential);
    }

    #[test]
    fn mismatched_embedded_client_id_is_rejected_despite_valid_signature() {
        let object = signed_object(&json!({"client_id": "someone-else"}));

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        let result = processor.process(&outer(), &object, &client());
        assert!(matches!(
            result,
            Err(AuthorizeError::InvalidRequestObject(_))
        ));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let object = signed_object(&json!({"client_id": "client-1"}));
        let mut tampered = object.clone();
        tampered.pop();

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        assert!(processor.process(&outer(), &tampered, &client()).is_err());
    }

    #[test]
    fn unregistered_algorithm_is_rejected() {
        // Client registered HS256; object arrives signed with HS384
        let object = jws::encode_compact(
            JwsHeader::new(SignatureAlgorithm::Hs384),
            &json!({"client_id": "client-1"}),
            &SigningKeySource::Secret(SECRET.as_bytes()),
            JwsPolicy::default(),
        )
        .unwrap();

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        let result = processor.process(&outer(), &object, &client());
        assert!(matches!(
            result,
            Err(AuthorizeError::InvalidRequestObject(_))
        ));
    }

    #[test]
    fn unsigned_object_requires_permissive_policy() {
        let unsigned = jws::encode_compact(
            JwsHeader::new(SignatureAlgorithm::None),
            &json!({"client_id": "client-1", "nonce": "n1"}),
            &SigningKeySource::None,
            JwsPolicy::permissive(),
        )
        .unwrap();

        let mut client = client();
        client.request_object_signing_alg = Some(SignatureAlgorithm::None);

        let strict = RequestObjectProcessor::new(JwsPolicy::default());
        assert!(strict.process(&outer(), &unsigned, &client).is_err());

        let permissive = RequestObjectProcessor::new(JwsPolicy::permissive());
        let merged = permissive.process(&outer(), &unsigned, &client).unwrap();
        assert_eq!(merged.nonce.as_deref(), Some("n1"));
    }

    #[test]
    fn encrypted_object_with_symmetric_kek_roundtrips() {
        let kek = jwe::symmetric_kek(SECRET.as_bytes(), KeyManagementAlgorithm::A128Kw).unwrap();
        let payload = json!({"client_id": "client-1", "nonce": "enc-nonce"});
        let object = jwe::encrypt(
            payload.to_string().as_bytes(),
            &JweRecipientKey::Secret(&kek),
            JweHeader::new(
                KeyManagementAlgorithm::A128Kw,
                ContentEncryptionAlgorithm::A128CbcHs256,
            ),
        )
        .unwrap();

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        let merged = processor.process(&outer(), &object, &client()).unwrap();
        assert_eq!(merged.nonce.as_deref(), Some("enc-nonce"));
    }

    #[test]
    fn signed_then_encrypted_object_verifies_the_nested_signature() {
        let inner = signed_object(&json!({"client_id": "client-1", "nonce": "nested-nonce"}));
        let kek = jwe::symmetric_kek(SECRET.as_bytes(), KeyManagementAlgorithm::A256Kw).unwrap();
        let object = jwe::encrypt(
            inner.as_bytes(),
            &JweRecipientKey::Secret(&kek),
            JweHeader::new(
                KeyManagementAlgorithm::A256Kw,
                ContentEncryptionAlgorithm::A256Gcm,
            )
            .nested(),
        )
        .unwrap();

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        let merged = processor.process(&outer(), &object, &client()).unwrap();
        assert_eq!(merged.nonce.as_deref(), Some("nested-nonce"));
    }

    #[test]
    fn garbage_payload_is_structural_failure() {
        // Sign raw bytes that are not JSON
        let header = JwsHeader::new(SignatureAlgorithm::Hs256);
        let object = {
            use base64::engine::general_purpose::URL_SAFE_NO_PAD;
            use base64::Engine;
            let h = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
            let p = URL_SAFE_NO_PAD.encode(b"not json");
            let input = format!("{h}.{p}");
            let sig = jws::sign(
                input.as_bytes(),
                &SigningKeySource::Secret(SECRET.as_bytes()),
                SignatureAlgorithm::Hs256,
                JwsPolicy::default(),
            )
            .unwrap();
            format!("{input}.{sig}")
        };

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        let result = processor.process(&outer(), &object, &client());
        assert!(matches!(
            result,
            Err(AuthorizeError::InvalidRequestObject(_))
        ));
    }

    #[test]
    fn object_claims_override_query_claims_per_name() {
        let mut query_claims = ClaimsRequest::new();
        query_claims.add_userinfo_claim("email", ClaimRequest::essential(false));
        query_claims.add_userinfo_claim("name", ClaimRequest::null());

        let outer = AuthorizationRequest::builder("client-1", "code".parse().unwrap())
            .redirect_uri("https://rp.example.com/cb")
            .scope(["openid"])
            .claims(query_claims)
            .build()
            .unwrap();

        let object = signed_object(&json!({
            "client_id": "client-1",
            "claims": {"userinfo": {"email": {"essential": true}}},
        }));

        let processor = RequestObjectProcessor::new(JwsPolicy::default());
        let merged = processor.process(&outer, &object, &client()).unwrap();
        let claims = merged.claims.unwrap();

        assert!(claims.userinfo_claim("email").unwrap().essential);
        assert!(claims.userinfo_claim("name").is_some());
    }
}
