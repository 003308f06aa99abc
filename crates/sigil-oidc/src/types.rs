//! Common OAuth 2.0 / `OpenID` Connect protocol types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthorizeError;

/// OAuth 2.0 response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseType {
    /// Authorization code.
    #[serde(rename = "code")]
    Code,

    /// Access token (implicit).
    #[serde(rename = "token")]
    Token,

    /// ID token.
    #[serde(rename = "id_token")]
    IdToken,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Code => "code",
            Self::Token => "token",
            Self::IdToken => "id_token",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ResponseType {
    type Err = AuthorizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "token" => Ok(Self::Token),
            "id_token" => Ok(Self::IdToken),
            _ => Err(AuthorizeError::UnsupportedResponseType(s.to_string())),
        }
    }
}

/// The requested response type combination.
///
/// An ordered set: order is preserved as requested (it is significant for
/// response composition) and duplicates are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseTypes(Vec<ResponseType>);

impl ResponseTypes {
    /// Creates a response type set, rejecting duplicates.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` on a duplicate entry.
    pub fn new(types: Vec<ResponseType>) -> Result<Self, AuthorizeError> {
        let mut seen = Vec::new();
        for t in &types {
            if seen.contains(t) {
                return Err(AuthorizeError::InvalidRequest(format!(
                    "duplicate response_type '{t}'"
                )));
            }
            seen.push(*t);
        }
        Ok(Self(types))
    }

    /// Returns the response types in request order.
    #[must_use]
    pub fn as_slice(&self) -> &[ResponseType] {
        &self.0
    }

    /// Returns whether the set contains the given type.
    #[must_use]
    pub fn contains(&self, t: ResponseType) -> bool {
        self.0.contains(&t)
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks if this is the pure authorization code flow.
    #[must_use]
    pub fn is_code_flow(&self) -> bool {
        self.0 == [ResponseType::Code]
    }

    /// Checks if this is an implicit flow (no code).
    #[must_use]
    pub fn is_implicit_flow(&self) -> bool {
        !self.0.is_empty() && !self.contains(ResponseType::Code)
    }

    /// Checks if this is a hybrid flow (code plus tokens).
    #[must_use]
    pub fn is_hybrid_flow(&self) -> bool {
        self.contains(ResponseType::Code) && self.0.len() > 1
    }

    /// Returns whether the response must travel in the URI fragment.
    ///
    /// Any flow that delivers a token or ID token through the redirect
    /// uses the fragment; only the pure code flow uses the query.
    #[must_use]
    pub fn requires_fragment(&self) -> bool {
        self.contains(ResponseType::Token) || self.contains(ResponseType::IdToken)
    }

    /// Compares as a set, ignoring order.
    #[must_use]
    pub fn same_set(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|t| other.contains(*t))
    }
}

impl FromStr for ResponseTypes {
    type Err = AuthorizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let types = s
            .split_whitespace()
            .map(ResponseType::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(types)
    }
}

impl fmt::Display for ResponseTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{joined}")
    }
}

/// OIDC prompt values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prompt {
    /// No user interaction permitted.
    #[serde(rename = "none")]
    None,

    /// Force re-authentication.
    #[serde(rename = "login")]
    Login,

    /// Force the consent screen.
    #[serde(rename = "consent")]
    Consent,
}

impl FromStr for Prompt {
    type Err = AuthorizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "login" => Ok(Self::Login),
            "consent" => Ok(Self::Consent),
            _ => Err(AuthorizeError::InvalidRequest(format!(
                "unknown prompt value '{s}'"
            ))),
        }
    }
}

/// Parses a space-separated prompt parameter.
///
/// `prompt=none` is mutually exclusive with every other value; the
/// combination is rejected here, before any interaction step.
///
/// # Errors
///
/// Returns `invalid_request` on unknown values or an invalid combination.
pub fn parse_prompts(value: &str) -> Result<Vec<Prompt>, AuthorizeError> {
    let prompts = value
        .split_whitespace()
        .map(Prompt::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if prompts.contains(&Prompt::None) && prompts.len() > 1 {
        return Err(AuthorizeError::InvalidRequest(
            "prompt=none cannot be combined with other prompt values".to_string(),
        ));
    }

    Ok(prompts)
}

/// OAuth 2.0 response modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResponseMode {
    /// Query string parameters (default for the code flow).
    #[serde(rename = "query")]
    #[default]
    Query,

    /// Fragment parameters (default for implicit and hybrid flows).
    #[serde(rename = "fragment")]
    Fragment,

    /// Auto-submitting form POST.
    #[serde(rename = "form_post")]
    FormPost,
}

impl FromStr for ResponseMode {
    type Err = AuthorizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Self::Query),
            "fragment" => Ok(Self::Fragment),
            "form_post" => Ok(Self::FormPost),
            _ => Err(AuthorizeError::InvalidRequest(format!(
                "unknown response_mode '{s}'"
            ))),
        }
    }
}

/// OIDC display hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Display {
    /// Full user agent page.
    #[serde(rename = "page")]
    #[default]
    Page,

    /// Popup window.
    #[serde(rename = "popup")]
    Popup,

    /// Touch-optimized dialog.
    #[serde(rename = "touch")]
    Touch,

    /// Feature phone display.
    #[serde(rename = "wap")]
    Wap,
}

impl FromStr for Display {
    type Err = AuthorizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(Self::Page),
            "popup" => Ok(Self::Popup),
            "touch" => Ok(Self::Touch),
            "wap" => Ok(Self::Wap),
            _ => Err(AuthorizeError::InvalidRequest(format!(
                "unknown display value '{s}'"
            ))),
        }
    }
}

/// Subject identifier derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SubjectType {
    /// Same subject for all clients.
    #[serde(rename = "public")]
    #[default]
    Public,

    /// Per-sector subject.
    #[serde(rename = "pairwise")]
    Pairwise,
}

/// Standard OIDC scopes.
pub mod scopes {
    /// `OpenID` Connect scope, required for OIDC flows.
    pub const OPENID: &str = "openid";
    /// Profile claim group.
    pub const PROFILE: &str = "profile";
    /// Email claim group.
    pub const EMAIL: &str = "email";
    /// Address claim.
    pub const ADDRESS: &str = "address";
    /// Phone claim group.
    pub const PHONE: &str = "phone";
}
