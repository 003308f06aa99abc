//! Client registration metadata and the directory contract.
//!
//! Registration storage is an external collaborator; the core consumes
//! this read-only view of a registered client through
//! [`ClientDirectory`]. The in-memory directory exists for embedding in
//! tests and single-process setups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sigil_jose::{
    ContentEncryptionAlgorithm, JsonWebKeySet, KeyManagementAlgorithm, SignatureAlgorithm,
};

use crate::types::{ResponseTypes, SubjectType};

/// A registered client, as the authorization core sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// OAuth client identifier.
    pub client_id: String,

    /// Registered redirect URIs; matching is exact.
    pub redirect_uris: Vec<String>,

    /// Response type combinations the client registered for.
    #[serde(skip)]
    pub response_types: Vec<ResponseTypes>,

    /// Client secret, for confidential clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Inline client key set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JsonWebKeySet>,

    /// URI of the client's published key set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// First-party clients skip the consent step.
    pub trusted: bool,

    /// Subject identifier derivation for this client.
    pub subject_type: SubjectType,

    /// ID Token signing algorithm.
    pub id_token_signed_response_alg: SignatureAlgorithm,

    /// ID Token encryption, when registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_encrypted_response_alg: Option<KeyManagementAlgorithm>,

    /// ID Token content encryption, when registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_encrypted_response_enc: Option<ContentEncryptionAlgorithm>,

    /// UserInfo signing algorithm; absent means plain JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_signed_response_alg: Option<SignatureAlgorithm>,

    /// UserInfo encryption, when registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_encrypted_response_alg: Option<KeyManagementAlgorithm>,

    /// UserInfo content encryption, when registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_encrypted_response_enc: Option<ContentEncryptionAlgorithm>,

    /// Expected request object signing algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_object_signing_alg: Option<SignatureAlgorithm>,

    /// Expected request object key-management algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_object_encryption_alg: Option<KeyManagementAlgorithm>,

    /// Expected request object content encryption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_object_encryption_enc: Option<ContentEncryptionAlgorithm>,
}

impl ClientMetadata {
    /// Creates a registration with the defaults a dynamic registration
    /// would get: code flow, public subjects, RS256 ID Tokens, untrusted.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uris: Vec::new(),
            response_types: Vec::new(),
            secret: None,
            jwks: None,
            jwks_uri: None,
            trusted: false,
            subject_type: SubjectType::Public,
            id_token_signed_response_alg: SignatureAlgorithm::Rs256,
            id_token_encrypted_response_alg: None,
            id_token_encrypted_response_enc: None,
            userinfo_signed_response_alg: None,
            userinfo_encrypted_response_alg: None,
            userinfo_encrypted_response_enc: None,
            request_object_signing_alg: None,
            request_object_encryption_alg: None,
            request_object_encryption_enc: None,
        }
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Registers a response type combination.
    #[must_use]
    pub fn with_response_types(mut self, types: ResponseTypes) -> Self {
        self.response_types.push(types);
        self
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Marks the client as first-party.
    #[must_use]
    pub const fn trusted(mut self) -> Self {
        self.trusted = true;
        self
    }

    /// Sets the inline client key set.
    #[must_use]
    pub fn with_jwks(mut self, jwks: JsonWebKeySet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Sets the ID Token signing algorithm.
    #[must_use]
    pub const fn with_id_token_alg(mut self, alg: SignatureAlgorithm) -> Self {
        self.id_token_signed_response_alg = alg;
        self
    }

    /// Registers ID Token encryption.
    #[must_use]
    pub const fn with_id_token_encryption(
        mut self,
        alg: KeyManagementAlgorithm,
        enc: ContentEncryptionAlgorithm,
    ) -> Self {
        self.id_token_encrypted_response_alg = Some(alg);
        self.id_token_encrypted_response_enc = Some(enc);
        self
    }

    /// Sets the UserInfo signing algorithm.
    #[must_use]
    pub const fn with_userinfo_alg(mut self, alg: SignatureAlgorithm) -> Self {
        self.userinfo_signed_response_alg = Some(alg);
        self
    }

    /// Registers UserInfo encryption.
    #[must_use]
    pub const fn with_userinfo_encryption(
        mut self,
        alg: KeyManagementAlgorithm,
        enc: ContentEncryptionAlgorithm,
    ) -> Self {
        self.userinfo_encrypted_response_alg = Some(alg);
        self.userinfo_encrypted_response_enc = Some(enc);
        self
    }

    /// Sets the expected request object signing algorithm.
    #[must_use]
    pub const fn with_request_object_alg(mut self, alg: SignatureAlgorithm) -> Self {
        self.request_object_signing_alg = Some(alg);
        self
    }

    /// Registers request object encryption.
    #[must_use]
    pub const fn with_request_object_encryption(
        mut self,
        alg: KeyManagementAlgorithm,
        enc: ContentEncryptionAlgorithm,
    ) -> Self {
        self.request_object_encryption_alg = Some(alg);
        self.request_object_encryption_enc = Some(enc);
        self
    }

    /// Sets pairwise subject derivation.
    #[must_use]
    pub const fn pairwise(mut self) -> Self {
        self.subject_type = SubjectType::Pairwise;
        self
    }

    /// Returns whether the URI is registered for this client.
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    /// Returns whether the requested combination is registered.
    ///
    /// A client with no registered combinations accepts the pure code
    /// flow only.
    #[must_use]
    pub fn allows_response_types(&self, requested: &ResponseTypes) -> bool {
        if self.response_types.is_empty() {
            return requested.is_code_flow();
        }
        self.response_types
            .iter()
            .any(|registered| registered.same_set(requested))
    }
}

/// Read access to the client registry.
pub trait ClientDirectory: Send + Sync {
    /// Looks up a registered client.
    fn get_client(&self, client_id: &str) -> Option<ClientMetadata>;
}

/// In-memory client directory.
#[derive(Debug, Default)]
pub struct InMemoryClientDirectory {
    clients: HashMap<String, ClientMetadata>,
}

impl InMemoryClientDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client.
    pub fn register(&mut self, client: ClientMetadata) {
        self.clients.insert(client.client_id.clone(), client);
    }
}

impl ClientDirectory for InMemoryClientDirectory {
    fn get_client(&self, client_id: &str) -> Option<ClientMetadata> {
        self.clients.get(client_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_matching_is_exact() {
        let client = ClientMetadata::new("client-1")
            .with_redirect_uri("https://rp.example.com/cb");

        assert!(client.has_redirect_uri("https://rp.example.com/cb"));
        assert!(!client.has_redirect_uri("https://rp.example.com/cb/"));
        assert!(!client.has_redirect_uri("https://rp.example.com/cb?x=1"));
    }

    #[test]
    fn default_registration_allows_code_flow_only() {
        let client = ClientMetadata::new("client-1");
        assert!(client.allows_response_types(&"code".parse().unwrap()));
        assert!(!client.allows_response_types(&"token".parse().unwrap()));
    }

    #[test]
    fn registered_combination_matches_as_a_set() {
        let client = ClientMetadata::new("client-1")
            .with_response_types("code id_token".parse().unwrap());

        assert!(client.allows_response_types(&"id_token code".parse().unwrap()));
        assert!(!client.allows_response_types(&"code".parse().unwrap()));
    }

    #[test]
    fn directory_lookup() {
        let mut directory = InMemoryClientDirectory::new();
        directory.register(ClientMetadata::new("client-1"));

        assert!(directory.get_client("client-1").is_some());
        assert!(directory.get_client("client-2").is_none());
    }
}
