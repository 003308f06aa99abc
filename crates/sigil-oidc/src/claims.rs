//! Claim values, claim-request constraints, and token claim sets.
//!
//! Implements the `claims` request parameter from `OpenID` Connect Core
//! 5.5 (two independent top-level members, `id_token` and `userinfo`,
//! each mapping claim names to a constraint) and the claim sets carried
//! in issued tokens.
//!
//! Claim values are multivalued-aware: a list claim keeps all its
//! elements in order, through every signing and encryption combination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AuthorizeError;

/// A claim value.
///
/// One of null, boolean, string, number, or an ordered sequence of
/// strings. Collapsing a multivalued claim to a single value is a defect.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// String.
    String(String),
    /// Number.
    Number(serde_json::Number),
    /// Ordered sequence of strings.
    StringList(Vec<String>),
}

impl ClaimValue {
    /// Converts to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::StringList(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Parses from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for objects and non-string arrays.
    pub fn from_json(value: &Value) -> Result<Self, AuthorizeError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::String(s) => Ok(Self::String(s.clone())),
            Value::Number(n) => Ok(Self::Number(n.clone())),
            Value::Array(items) => {
                let strings = items
                    .iter()
                    .map(|v| {
                        v.as_str().map(ToString::to_string).ok_or_else(|| {
                            AuthorizeError::InvalidRequest(
                                "claim value lists may only contain strings".to_string(),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::StringList(strings))
            }
            Value::Object(_) => Err(AuthorizeError::InvalidRequest(
                "claim values may not be objects".to_string(),
            )),
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Vec<String>> for ClaimValue {
    fn from(values: Vec<String>) -> Self {
        Self::StringList(values)
    }
}

/// Per-claim request constraint.
///
/// The four shapes of the OIDC `claims` parameter: null (voluntary),
/// `{"essential": bool}`, `{"value": v}`, and `{"values": [v...]}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClaimRequest {
    /// Whether the claim is essential for the client.
    pub essential: bool,

    /// A single required value.
    pub value: Option<ClaimValue>,

    /// A set of acceptable values.
    pub values: Option<Vec<ClaimValue>>,
}

impl ClaimRequest {
    /// The voluntary, unconstrained request (`null`).
    #[must_use]
    pub fn null() -> Self {
        Self::default()
    }

    /// An essential-flag request.
    #[must_use]
    pub fn essential(essential: bool) -> Self {
        Self {
            essential,
            ..Self::default()
        }
    }

    /// A single-value request.
    #[must_use]
    pub fn value(value: impl Into<ClaimValue>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// A value-list request.
    #[must_use]
    pub fn values(values: Vec<ClaimValue>) -> Self {
        Self {
            values: Some(values),
            ..Self::default()
        }
    }

    /// Serializes to the wire shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        if !self.essential && self.value.is_none() && self.values.is_none() {
            return Value::Null;
        }

        let mut object = Map::new();
        if self.essential {
            object.insert("essential".to_string(), Value::Bool(true));
        }
        if let Some(value) = &self.value {
            object.insert("value".to_string(), value.to_json());
        }
        if let Some(values) = &self.values {
            object.insert(
                "values".to_string(),
                Value::Array(values.iter().map(ClaimValue::to_json).collect()),
            );
        }
        Value::Object(object)
    }

    /// Parses from the wire shape.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if the constraint is not null or an
    /// object of the defined members.
    pub fn from_json(value: &Value) -> Result<Self, AuthorizeError> {
        match value {
            Value::Null => Ok(Self::null()),
            Value::Object(object) => {
                let essential = object
                    .get("essential")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let single = object
                    .get("value")
                    .map(ClaimValue::from_json)
                    .transpose()?;
                let list = object
                    .get("values")
                    .map(|v| {
                        v.as_array()
                            .ok_or_else(|| {
                                AuthorizeError::InvalidRequest(
                                    "'values' must be an array".to_string(),
                                )
                            })?
                            .iter()
                            .map(ClaimValue::from_json)
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .transpose()?;
                Ok(Self {
                    essential,
                    value: single,
                    values: list,
                })
            }
            _ => Err(AuthorizeError::InvalidRequest(
                "claim request must be null or an object".to_string(),
            )),
        }
    }
}

/// The `claims` request parameter.
///
/// Two independent ordered claim-name maps, one for the ID Token and one
/// for the UserInfo response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimsRequest {
    /// Claims requested for the ID Token.
    pub id_token: Vec<(String, ClaimRequest)>,

    /// Claims requested for the UserInfo response.
    pub userinfo: Vec<(String, ClaimRequest)>,
}

impl ClaimsRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates an ID Token claim request.
    pub fn add_id_token_claim(&mut self, name: impl Into<String>, request: ClaimRequest) {
        upsert(&mut self.id_token, name.into(), request);
    }

    /// Accumulates a UserInfo claim request.
    pub fn add_userinfo_claim(&mut self, name: impl Into<String>, request: ClaimRequest) {
        upsert(&mut self.userinfo, name.into(), request);
    }

    /// Looks up a UserInfo claim constraint.
    #[must_use]
    pub fn userinfo_claim(&self, name: &str) -> Option<&ClaimRequest> {
        self.userinfo.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Looks up an ID Token claim constraint.
    #[must_use]
    pub fn id_token_claim(&self, name: &str) -> Option<&ClaimRequest> {
        self.id_token.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Returns whether both members are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_token.is_empty() && self.userinfo.is_empty()
    }

    /// Merges constraints from a request object into this request.
    ///
    /// Per-claim the incoming constraint wins (it arrives under the
    /// client's signature); names present in only one source are unioned.
    pub fn merge_from(&mut self, other: &Self) {
        for (name, request) in &other.id_token {
            upsert(&mut self.id_token, name.clone(), request.clone());
        }
        for (name, request) in &other.userinfo {
            upsert(&mut self.userinfo, name.clone(), request.clone());
        }
    }

    /// Serializes to the JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let member = |claims: &[(String, ClaimRequest)]| {
            Value::Object(
                claims
                    .iter()
                    .map(|(name, request)| (name.clone(), request.to_json()))
                    .collect(),
            )
        };

        let mut object = Map::new();
        if !self.id_token.is_empty() {
            object.insert("id_token".to_string(), member(&self.id_token));
        }
        if !self.userinfo.is_empty() {
            object.insert("userinfo".to_string(), member(&self.userinfo));
        }
        Value::Object(object)
    }

    /// Parses the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if the parameter is not well-formed.
    pub fn parse(raw: &str) -> Result<Self, AuthorizeError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| {
            AuthorizeError::InvalidRequest("claims parameter is not valid JSON".to_string())
        })?;
        Self::from_json(&value)
    }

    /// Parses from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if the structure is not as defined.
    pub fn from_json(value: &Value) -> Result<Self, AuthorizeError> {
        let object = value.as_object().ok_or_else(|| {
            AuthorizeError::InvalidRequest("claims parameter must be an object".to_string())
        })?;

        let parse_member = |member: Option<&Value>| -> Result<Vec<(String, ClaimRequest)>, AuthorizeError> {
            match member {
                None => Ok(Vec::new()),
                Some(value) => {
                    let entries = value.as_object().ok_or_else(|| {
                        AuthorizeError::InvalidRequest(
                            "claims member must be an object".to_string(),
                        )
                    })?;
                    entries
                        .iter()
                        .map(|(name, v)| Ok((name.clone(), ClaimRequest::from_json(v)?)))
                        .collect()
                }
            }
        };

        Ok(Self {
            id_token: parse_member(object.get("id_token"))?,
            userinfo: parse_member(object.get("userinfo"))?,
        })
    }
}

fn upsert(claims: &mut Vec<(String, ClaimRequest)>, name: String, request: ClaimRequest) {
    if let Some(entry) = claims.iter_mut().find(|(n, _)| *n == name) {
        entry.1 = request;
    } else {
        claims.push((name, request));
    }
}

/// ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject identifier.
    pub sub: String,

    /// Audience, the requesting client.
    pub aud: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued-at time (Unix timestamp).
    pub iat: i64,

    /// Authentication time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Nonce echoed from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authentication methods references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amr: Option<Vec<String>>,

    /// Authorized party.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Access token hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    /// Authorization code hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,

    /// Session ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Additional requested claims.
    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl IdTokenClaims {
    /// Creates new ID token claims.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: audience.into(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            auth_time: None,
            nonce: None,
            acr: None,
            amr: None,
            azp: None,
            at_hash: None,
            c_hash: None,
            sid: None,
            additional: HashMap::new(),
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the authentication time.
    #[must_use]
    pub const fn with_auth_time(mut self, auth_time: i64) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    /// Sets the access token hash.
    #[must_use]
    pub fn with_at_hash(mut self, at_hash: impl Into<String>) -> Self {
        self.at_hash = Some(at_hash.into());
        self
    }

    /// Sets the code hash.
    #[must_use]
    pub fn with_c_hash(mut self, c_hash: impl Into<String>) -> Self {
        self.c_hash = Some(c_hash.into());
        self
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Sets the ACR value.
    #[must_use]
    pub fn with_acr(mut self, acr: impl Into<String>) -> Self {
        self.acr = Some(acr.into());
        self
    }

    /// Adds a requested claim.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.additional.insert(name.into(), value);
        self
    }
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject identifier.
    pub sub: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued-at time (Unix timestamp).
    pub iat: i64,

    /// Token identifier.
    pub jti: String,

    /// Token type.
    pub typ: String,

    /// Authorized party, the requesting client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Session ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Granted scope, space separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AccessTokenClaims {
    /// Creates new access token claims.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            jti: Uuid::now_v7().to_string(),
            typ: "Bearer".to_string(),
            azp: None,
            sid: None,
            scope: None,
        }
    }

    /// Sets the authorized party.
    #[must_use]
    pub fn with_azp(mut self, client_id: impl Into<String>) -> Self {
        self.azp = Some(client_id.into());
        self
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Sets the granted scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Checks if the token is expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claims_parameter_roundtrip() {
        let mut request = ClaimsRequest::new();
        request.add_userinfo_claim("name", ClaimRequest::null());
        request.add_userinfo_claim("email", ClaimRequest::essential(true));
        request.add_id_token_claim("acr", ClaimRequest::values(vec!["urn:mace:basic".into()]));
        request.add_id_token_claim("sub", ClaimRequest::value("user-1"));

        let json = request.to_json().to_string();
        let parsed = ClaimsRequest::parse(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn null_constraint_serializes_to_json_null() {
        assert_eq!(ClaimRequest::null().to_json(), Value::Null);
        assert_eq!(
            ClaimRequest::essential(true).to_json(),
            json!({"essential": true})
        );
    }

    #[test]
    fn essential_false_is_not_null() {
        // {"essential": false} parses distinct from null but serializes
        // back to null, which is semantically identical on the wire
        let parsed = ClaimRequest::from_json(&json!({"essential": false})).unwrap();
        assert!(!parsed.essential);
    }

    #[test]
    fn multivalued_claim_preserves_all_elements() {
        let value = ClaimValue::from_json(&json!(["g1", "g2", "g3"])).unwrap();
        assert_eq!(
            value,
            ClaimValue::StringList(vec!["g1".into(), "g2".into(), "g3".into()])
        );
        assert_eq!(value.to_json(), json!(["g1", "g2", "g3"]));
    }

    #[test]
    fn accumulating_same_claim_replaces() {
        let mut request = ClaimsRequest::new();
        request.add_userinfo_claim("email", ClaimRequest::null());
        request.add_userinfo_claim("email", ClaimRequest::essential(true));

        assert_eq!(request.userinfo.len(), 1);
        assert!(request.userinfo_claim("email").unwrap().essential);
    }

    #[test]
    fn merge_prefers_incoming_and_unions_the_rest() {
        let mut query = ClaimsRequest::new();
        query.add_userinfo_claim("name", ClaimRequest::null());
        query.add_userinfo_claim("email", ClaimRequest::essential(false));

        let mut object = ClaimsRequest::new();
        object.add_userinfo_claim("email", ClaimRequest::essential(true));
        object.add_id_token_claim("acr", ClaimRequest::null());

        query.merge_from(&object);

        assert!(query.userinfo_claim("name").is_some());
        assert!(query.userinfo_claim("email").unwrap().essential);
        assert!(query.id_token_claim("acr").is_some());
    }

    #[test]
    fn id_token_claims_skip_absent_fields() {
        let claims = IdTokenClaims::new(
            "https://op.example.com",
            "user-1",
            "client-1",
            Utc::now() + chrono::Duration::minutes(5),
        )
        .with_nonce("n-0S6_WzA2Mj");

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("\"nonce\":\"n-0S6_WzA2Mj\""));
        assert!(!json.contains("at_hash"));
        assert!(!json.contains("c_hash"));
    }

    #[test]
    fn claim_request_rejects_object_values() {
        let result = ClaimValue::from_json(&json!({"nested": true}));
        assert!(result.is_err());
    }
}
