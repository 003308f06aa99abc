//! The authorization request.
//!
//! [`AuthorizationRequest`] is a finished, validated value object;
//! mutation is confined to [`AuthorizationRequestBuilder`] and to the
//! request object processor's merge, which produces a new value rather
//! than editing a published one.

use std::collections::HashMap;
use std::str::FromStr;

use crate::claims::ClaimsRequest;
use crate::error::AuthorizeError;
use crate::types::{parse_prompts, Display, Prompt, ResponseMode, ResponseTypes};

/// A validated authorization request.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequest {
    /// Requested response types, in request order.
    pub response_types: ResponseTypes,

    /// Requesting client.
    pub client_id: String,

    /// Redirect URI; optional only for a single-URI trusted client.
    pub redirect_uri: Option<String>,

    /// Requested scopes, in request order without duplicates.
    pub scope: Vec<String>,

    /// Opaque client state, echoed back unmodified.
    pub state: Option<String>,

    /// Replay nonce, echoed in the ID Token.
    pub nonce: Option<String>,

    /// Explicit response mode.
    pub response_mode: Option<ResponseMode>,

    /// Display hint.
    pub display: Option<Display>,

    /// Prompt values; `none` never appears alongside others.
    pub prompt: Vec<Prompt>,

    /// Maximum acceptable authentication age in seconds.
    pub max_age: Option<i64>,

    /// Preferred UI locales.
    pub ui_locales: Vec<String>,

    /// Requested authentication context class references.
    pub acr_values: Vec<String>,

    /// Login hint for the authentication UI.
    pub login_hint: Option<String>,

    /// Previously issued ID Token hint.
    pub id_token_hint: Option<String>,

    /// Requested claims.
    pub claims: Option<ClaimsRequest>,

    /// Inline request object (compact JWS/JWE), not yet processed.
    pub request: Option<String>,

    /// Reference to a request object, dereferenced by a collaborator.
    pub request_uri: Option<String>,
}

impl AuthorizationRequest {
    /// Starts a builder.
    #[must_use]
    pub fn builder(
        client_id: impl Into<String>,
        response_types: ResponseTypes,
    ) -> AuthorizationRequestBuilder {
        AuthorizationRequestBuilder {
            request: Self {
                client_id: client_id.into(),
                response_types,
                ..Self::default()
            },
        }
    }

    /// Parses an authorization request from decoded query parameters.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for missing required parameters and
    /// invalid combinations; `unsupported_response_type` for unknown
    /// response types.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AuthorizeError> {
        let client_id = params
            .get("client_id")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthorizeError::InvalidRequest("client_id is required".to_string()))?;

        let response_types = params
            .get("response_type")
            .ok_or_else(|| {
                AuthorizeError::InvalidRequest("response_type is required".to_string())
            })
            .and_then(|v| ResponseTypes::from_str(v))?;

        let mut builder = Self::builder(client_id, response_types);

        if let Some(uri) = params.get("redirect_uri") {
            builder = builder.redirect_uri(uri);
        }
        if let Some(scope) = params.get("scope") {
            builder = builder.scope(scope.split_whitespace());
        }
        if let Some(state) = params.get("state") {
            builder = builder.state(state);
        }
        if let Some(nonce) = params.get("nonce") {
            builder = builder.nonce(nonce);
        }
        if let Some(mode) = params.get("response_mode") {
            builder = builder.response_mode(ResponseMode::from_str(mode)?);
        }
        if let Some(display) = params.get("display") {
            builder = builder.display(Display::from_str(display)?);
        }
        if let Some(prompt) = params.get("prompt") {
            builder = builder.prompt_raw(prompt)?;
        }
        if let Some(max_age) = params.get("max_age") {
            let seconds = max_age.parse::<i64>().map_err(|_| {
                AuthorizeError::InvalidRequest("max_age must be an integer".to_string())
            })?;
            builder = builder.max_age(seconds);
        }
        if let Some(locales) = params.get("ui_locales") {
            builder = builder.ui_locales(locales.split_whitespace());
        }
        if let Some(acr) = params.get("acr_values") {
            builder = builder.acr_values(acr.split_whitespace());
        }
        if let Some(hint) = params.get("login_hint") {
            builder = builder.login_hint(hint);
        }
        if let Some(hint) = params.get("id_token_hint") {
            builder = builder.id_token_hint(hint);
        }
        if let Some(claims) = params.get("claims") {
            builder = builder.claims(ClaimsRequest::parse(claims)?);
        }
        if let Some(request) = params.get("request") {
            builder = builder.request_object(request);
        }
        if let Some(uri) = params.get("request_uri") {
            builder = builder.request_uri(uri);
        }

        builder.build()
    }

    /// Returns whether `prompt=none` was requested.
    #[must_use]
    pub fn is_prompt_none(&self) -> bool {
        self.prompt.contains(&Prompt::None)
    }

    /// Returns whether re-authentication is forced.
    #[must_use]
    pub fn forces_login(&self) -> bool {
        self.prompt.contains(&Prompt::Login)
    }

    /// Returns whether the consent screen is forced.
    #[must_use]
    pub fn forces_consent(&self) -> bool {
        self.prompt.contains(&Prompt::Consent)
    }

    /// Returns whether this is an `OpenID` Connect request.
    #[must_use]
    pub fn is_oidc(&self) -> bool {
        self.scope.iter().any(|s| s == crate::types::scopes::OPENID)
    }

    /// Returns the scope as a space-separated string.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scope.join(" ")
    }

    /// Returns the effective response mode.
    ///
    /// Explicit `response_mode` wins; otherwise fragment whenever a token
    /// travels in the redirect, query for the pure code flow.
    #[must_use]
    pub fn effective_response_mode(&self) -> ResponseMode {
        self.response_mode.unwrap_or({
            if self.response_types.requires_fragment() {
                ResponseMode::Fragment
            } else {
                ResponseMode::Query
            }
        })
    }
}

/// Builder producing a finished [`AuthorizationRequest`].
#[derive(Debug)]
pub struct AuthorizationRequestBuilder {
    request: AuthorizationRequest,
}

impl AuthorizationRequestBuilder {
    /// Sets the redirect URI.
    #[must_use]
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.request.redirect_uri = Some(uri.into());
        self
    }

    /// Sets the scopes, dropping duplicates while keeping order.
    #[must_use]
    pub fn scope<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for scope in scopes {
            let scope = scope.into();
            if !seen.contains(&scope) {
                seen.push(scope);
            }
        }
        self.request.scope = seen;
        self
    }

    /// Sets the state.
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.request.state = Some(state.into());
        self
    }

    /// Sets the nonce.
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.request.nonce = Some(nonce.into());
        self
    }

    /// Sets the response mode.
    #[must_use]
    pub const fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.request.response_mode = Some(mode);
        self
    }

    /// Sets the display hint.
    #[must_use]
    pub const fn display(mut self, display: Display) -> Self {
        self.request.display = Some(display);
        self
    }

    /// Sets the prompt values.
    #[must_use]
    pub fn prompt(mut self, prompt: Vec<Prompt>) -> Self {
        self.request.prompt = prompt;
        self
    }

    /// Parses and sets the prompt parameter.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for unknown values or `none` combined
    /// with other values.
    pub fn prompt_raw(mut self, raw: &str) -> Result<Self, AuthorizeError> {
        self.request.prompt = parse_prompts(raw)?;
        Ok(self)
    }

    /// Sets the maximum authentication age.
    #[must_use]
    pub const fn max_age(mut self, seconds: i64) -> Self {
        self.request.max_age = Some(seconds);
        self
    }

    /// Sets the UI locales.
    #[must_use]
    pub fn ui_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.ui_locales = locales.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the ACR values.
    #[must_use]
    pub fn acr_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.acr_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the login hint.
    #[must_use]
    pub fn login_hint(mut self, hint: impl Into<String>) -> Self {
        self.request.login_hint = Some(hint.into());
        self
    }

    /// Sets the ID Token hint.
    #[must_use]
    pub fn id_token_hint(mut self, hint: impl Into<String>) -> Self {
        self.request.id_token_hint = Some(hint.into());
        self
    }

    /// Sets the claims request.
    #[must_use]
    pub fn claims(mut self, claims: ClaimsRequest) -> Self {
        self.request.claims = Some(claims);
        self
    }

    /// Attaches an inline request object.
    #[must_use]
    pub fn request_object(mut self, token: impl Into<String>) -> Self {
        self.request.request = Some(token.into());
        self
    }

    /// Attaches a request object reference.
    #[must_use]
    pub fn request_uri(mut self, uri: impl Into<String>) -> Self {
        self.request.request_uri = Some(uri.into());
        self
    }

    /// Finishes the request.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if required parameters are missing,
    /// `prompt=none` is combined with other values, or both `request`
    /// and `request_uri` are present.
    pub fn build(self) -> Result<AuthorizationRequest, AuthorizeError> {
        let request = self.request;

        if request.client_id.is_empty() {
            return Err(AuthorizeError::InvalidRequest(
                "client_id is required".to_string(),
            ));
        }
        if request.response_types.is_empty() {
            return Err(AuthorizeError::InvalidRequest(
                "response_type is required".to_string(),
            ));
        }
        if request.prompt.contains(&Prompt::None) && request.prompt.len() > 1 {
            return Err(AuthorizeError::InvalidRequest(
                "prompt=none cannot be combined with other prompt values".to_string(),
            ));
        }
        if request.request.is_some() && request.request_uri.is_some() {
            return Err(AuthorizeError::InvalidRequest(
                "request and request_uri are mutually exclusive".to_string(),
            ));
        }

        Ok(request)
    }
}
