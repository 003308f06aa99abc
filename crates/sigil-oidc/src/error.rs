//! Authorization protocol error types.
//!
//! Implements the OAuth 2.0 / `OpenID` Connect error vocabulary as defined
//! in RFC 6749 and `OpenID` Connect Core 1.0. Every variant maps to a wire
//! `error` code and an HTTP status for the direct-response case; whether
//! an error travels as a redirect or a direct response is decided by the
//! authorization flow, not here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sigil_jose::JoseError;

/// Result type for authorization operations.
pub type AuthorizeResult<T> = std::result::Result<T, AuthorizeError>;

/// Authorization protocol errors.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    /// Malformed or missing required parameter.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Unknown client, or client not allowed to make this request.
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    /// Resource owner declined the request.
    #[error("access_denied")]
    AccessDenied,

    /// Requested response type is not supported or not registered.
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    /// Requested scope is invalid or exceeds the registration.
    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    /// `prompt=none` but no authenticated session exists.
    #[error("login_required")]
    LoginRequired,

    /// `prompt=none` but consent has not been granted.
    #[error("consent_required")]
    ConsentRequired,

    /// The `request`/`request_uri` object failed validation.
    ///
    /// Covers signature and decryption failures, structural problems, a
    /// mismatched embedded `client_id`, and algorithms the client did not
    /// register.
    #[error("invalid_request_object: {0}")]
    InvalidRequestObject(String),

    /// Server-side failure while processing an otherwise valid request.
    #[error("server_error: {0}")]
    ServerError(String),
}

impl AuthorizeError {
    /// Returns the wire error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::LoginRequired => "login_required",
            Self::ConsentRequired => "consent_required",
            Self::InvalidRequestObject(_) => "invalid_request_object",
            Self::ServerError(_) => "server_error",
        }
    }

    /// Returns the HTTP status used when no redirect URI is available.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::UnsupportedResponseType(_)
            | Self::InvalidScope(_)
            | Self::InvalidRequestObject(_)
            | Self::LoginRequired
            | Self::ConsentRequired => 400,
            Self::UnauthorizedClient(_) => 401,
            Self::AccessDenied => 403,
            Self::ServerError(_) => 500,
        }
    }

    /// Creates the wire error body.
    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            error_description: Some(self.to_string()),
        }
    }
}

impl From<JoseError> for AuthorizeError {
    fn from(e: JoseError) -> Self {
        // Engine failures while minting are server-side; nothing the
        // client sent can make signing fail.
        Self::ServerError(e.to_string())
    }
}

/// OAuth 2.0 error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_client_is_401() {
        let error = AuthorizeError::UnauthorizedClient("no such client".to_string());
        assert_eq!(error.http_status(), 401);
        assert_eq!(error.error_code(), "unauthorized_client");
    }

    #[test]
    fn prompt_errors_use_oidc_codes() {
        assert_eq!(AuthorizeError::LoginRequired.error_code(), "login_required");
        assert_eq!(
            AuthorizeError::ConsentRequired.error_code(),
            "consent_required"
        );
    }

    #[test]
    fn error_response_carries_description() {
        let response =
            AuthorizeError::InvalidRequest("redirect_uri is required".to_string()).to_error_response();
        assert_eq!(response.error, "invalid_request");
        assert!(response.error_description.unwrap().contains("redirect_uri"));
    }
}
