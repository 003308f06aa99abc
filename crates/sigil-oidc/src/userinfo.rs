//! UserInfo response assembly and minting.
//!
//! Claims are released by scope group (profile, email, address, phone)
//! plus whatever the `claims` parameter requested for the `userinfo`
//! member. The response is plain JSON unless the client registered a
//! signing algorithm, and is additionally encrypted when it registered
//! an encryption pair. Multivalued claims pass through untouched.

use serde_json::{Map, Value};

use crate::claims::ClaimsRequest;
use crate::client::ClientMetadata;
use crate::error::AuthorizeResult;
use crate::mint::{subject_for_client, TokenIssuer};
use crate::types::scopes;

/// Resource-owner attributes, supplied by the user directory
/// collaborator.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    /// Local subject identifier.
    pub subject: String,

    /// Claim values keyed by claim name.
    pub claims: Map<String, Value>,
}

impl UserProfile {
    /// Creates a profile for a subject.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: Map::new(),
        }
    }

    /// Adds a claim value.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }
}

/// Claim names released by the `profile` scope.
const PROFILE_CLAIMS: &[&str] = &[
    "name",
    "given_name",
    "family_name",
    "middle_name",
    "nickname",
    "preferred_username",
    "profile",
    "picture",
    "website",
    "gender",
    "birthdate",
    "zoneinfo",
    "locale",
    "updated_at",
];

/// Claim names released by the `email` scope.
const EMAIL_CLAIMS: &[&str] = &["email", "email_verified"];

/// Claim names released by the `address` scope.
const ADDRESS_CLAIMS: &[&str] = &["address"];

/// Claim names released by the `phone` scope.
const PHONE_CLAIMS: &[&str] = &["phone_number", "phone_number_verified"];

/// A minted UserInfo response.
#[derive(Debug, Clone)]
pub enum UserInfoResponse {
    /// Plain JSON claims; the client registered no signing algorithm.
    Json(Value),

    /// Signed and/or encrypted compact token.
    Jwt(String),
}

impl UserInfoResponse {
    /// Returns the JSON claims when the response is unsigned.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Jwt(_) => None,
        }
    }

    /// Returns the compact token when the response is signed/encrypted.
    #[must_use]
    pub fn as_jwt(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Jwt(token) => Some(token.as_str()),
        }
    }
}

/// Assembles the UserInfo claim set for a granted request.
///
/// `sub` is always present; scope groups and the `userinfo` member of
/// the `claims` parameter select the rest from the profile.
#[must_use]
pub fn build_userinfo_claims(
    profile: &UserProfile,
    client: &ClientMetadata,
    granted_scopes: &[String],
    claims_request: Option<&ClaimsRequest>,
) -> Map<String, Value> {
    let mut released = Map::new();
    released.insert(
        "sub".to_string(),
        Value::String(subject_for_client(&profile.subject, client)),
    );

    let mut release_group = |names: &[&str]| {
        for name in names {
            if let Some(value) = profile.claims.get(*name) {
                released.insert((*name).to_string(), value.clone());
            }
        }
    };

    for scope in granted_scopes {
        match scope.as_str() {
            scopes::PROFILE => release_group(PROFILE_CLAIMS),
            scopes::EMAIL => release_group(EMAIL_CLAIMS),
            scopes::ADDRESS => release_group(ADDRESS_CLAIMS),
            scopes::PHONE => release_group(PHONE_CLAIMS),
            _ => {}
        }
    }

    if let Some(request) = claims_request {
        for (name, _constraint) in &request.userinfo {
            if let Some(value) = profile.claims.get(name) {
                released.insert(name.clone(), value.clone());
            }
        }
    }

    released
}

impl TokenIssuer {
    /// Mints the UserInfo response per the client's registration.
    ///
    /// Plain JSON when no signing algorithm is registered; otherwise a
    /// signed JWT carrying `iss` and `aud`, nested into a JWE when an
    /// encryption pair is registered.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when key material for the registered
    /// algorithms is unavailable.
    pub fn mint_userinfo_response(
        &self,
        claims: Map<String, Value>,
        client: &ClientMetadata,
    ) -> AuthorizeResult<UserInfoResponse> {
        let Some(algorithm) = client.userinfo_signed_response_alg else {
            // Encryption without signing still wraps the bare claims
            if let (Some(alg), Some(enc)) = (
                client.userinfo_encrypted_response_alg,
                client.userinfo_encrypted_response_enc,
            ) {
                let payload = Value::Object(claims).to_string();
                let token = self.encrypt_for_client(payload.as_bytes(), client, alg, enc, false)?;
                return Ok(UserInfoResponse::Jwt(token));
            }
            return Ok(UserInfoResponse::Json(Value::Object(claims)));
        };

        // Signed UserInfo responses carry issuer and audience
        let mut claims = claims;
        claims.insert("iss".to_string(), Value::String(self.issuer().to_string()));
        claims.insert("aud".to_string(), Value::String(client.client_id.clone()));

        let signed = self.sign_for_client(&Value::Object(claims), algorithm, client)?;

        match (
            client.userinfo_encrypted_response_alg,
            client.userinfo_encrypted_response_enc,
        ) {
            (Some(alg), Some(enc)) => {
                let token = self.encrypt_for_client(signed.as_bytes(), client, alg, enc, true)?;
                Ok(UserInfoResponse::Jwt(token))
            }
            _ => Ok(UserInfoResponse::Jwt(signed)),
        }
    }
}
