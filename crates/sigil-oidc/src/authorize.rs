//! Authorization state machine and response assembly.
//!
//! `Received → RequestValidated → {AwaitingAuthentication,
//! AwaitingConsent} → Decided → ResponseAssembled`, with `Error`
//! reachable from every state. Validation failures before a redirect URI
//! is established surface as direct responses; everything after travels
//! as redirect parameters with the client's `state` echoed unchanged.
//!
//! On grant, artifacts are minted in a fixed order (code, access token,
//! ID Token last) so the ID Token's `c_hash` and `at_hash` are computed
//! over the final bytes of the artifacts they bind.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::claims::IdTokenClaims;
use crate::client::{ClientDirectory, ClientMetadata};
use crate::error::AuthorizeError;
use crate::mint::{binding_hash, subject_for_client, TokenIssuer};
use crate::request::AuthorizationRequest;
use crate::session::Session;
use crate::types::{ResponseMode, ResponseType};
use crate::userinfo::UserProfile;

/// States of an authorization transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Raw request received, not yet validated.
    Received,
    /// Client, redirect URI, scope, and response types check out.
    RequestValidated,
    /// Resource owner must authenticate.
    AwaitingAuthentication,
    /// Resource owner must decide on consent.
    AwaitingConsent,
    /// Resource owner granted the request.
    Granted,
    /// Resource owner denied the request.
    Denied,
    /// Terminal success state.
    ResponseAssembled,
}

/// The interaction the caller must drive next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// No interaction needed; the flow is decided.
    None,
    /// Authenticate the resource owner, then call `authenticated`.
    Authenticate,
    /// Ask for consent, then call `grant` or `deny`.
    Consent,
}

/// How an authorization error reaches the client.
#[derive(Debug, Clone)]
pub enum ErrorDisposition {
    /// No redirect URI established; respond directly.
    Direct,

    /// Redirect URI validated; deliver via redirect parameters.
    Redirect {
        /// Where to send the user agent.
        redirect_uri: String,
        /// Query or fragment encoding.
        response_mode: ResponseMode,
        /// Client state, echoed unchanged.
        state: Option<String>,
    },
}

/// A failed authorization, with its delivery disposition.
#[derive(Debug)]
pub struct AuthorizationError {
    /// The protocol error.
    pub error: AuthorizeError,

    /// How to deliver it.
    pub disposition: ErrorDisposition,
}

impl AuthorizationError {
    fn direct(error: AuthorizeError) -> Self {
        Self {
            error,
            disposition: ErrorDisposition::Direct,
        }
    }

    /// Returns the HTTP status for the direct-response case.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.error.http_status()
    }

    /// Builds the redirect location carrying `error`,
    /// `error_description`, and `state`, when a redirect is available.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match &self.disposition {
            ErrorDisposition::Direct => None,
            ErrorDisposition::Redirect {
                redirect_uri,
                response_mode,
                state,
            } => {
                let mut params = vec![
                    ("error".to_string(), self.error.error_code().to_string()),
                    ("error_description".to_string(), self.error.to_string()),
                ];
                if let Some(state) = state {
                    params.push(("state".to_string(), state.clone()));
                }
                redirect_location(redirect_uri, &params, *response_mode)
            }
        }
    }
}

impl std::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for AuthorizationError {}

/// A successful authorization response.
///
/// Constructed once per granted authorization; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    /// Authorization code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Access token (implicit and hybrid flows).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Token type, `Bearer` whenever a token is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Access token lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// ID Token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Client state, echoed unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AuthorizationResponse {
    /// Returns the response as redirect parameters.
    #[must_use]
    pub fn redirect_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(code) = &self.code {
            params.push(("code".to_string(), code.clone()));
        }
        if let Some(token) = &self.access_token {
            params.push(("access_token".to_string(), token.clone()));
        }
        if let Some(token_type) = &self.token_type {
            params.push(("token_type".to_string(), token_type.clone()));
        }
        if let Some(expires_in) = self.expires_in {
            params.push(("expires_in".to_string(), expires_in.to_string()));
        }
        if let Some(id_token) = &self.id_token {
            params.push(("id_token".to_string(), id_token.clone()));
        }
        if let Some(state) = &self.state {
            params.push(("state".to_string(), state.clone()));
        }
        if let Some(scope) = &self.scope {
            params.push(("scope".to_string(), scope.clone()));
        }
        params
    }
}

/// Builds a redirect location for the given response mode.
///
/// Returns `None` for `form_post`, where the collaborator renders the
/// parameters as an auto-submitting form instead.
#[must_use]
pub fn redirect_location(
    redirect_uri: &str,
    params: &[(String, String)],
    mode: ResponseMode,
) -> Option<String> {
    match mode {
        ResponseMode::Query => {
            let mut url = url::Url::parse(redirect_uri).ok()?;
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            Some(url.into())
        }
        ResponseMode::Fragment => {
            let encoded: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            Some(format!("{redirect_uri}#{}", encoded.join("&")))
        }
        ResponseMode::FormPost => None,
    }
}

/// Validates an authorization request against the client registry.
///
/// `Received → RequestValidated`, or an error whose disposition depends
/// on how far validation got: failures before the redirect URI resolves
/// (unknown client, unregistered URI) are direct, everything after is a
/// redirect.
///
/// # Errors
///
/// See above.
pub fn validate_authorization_request<D: ClientDirectory>(
    directory: &D,
    request: AuthorizationRequest,
) -> Result<AuthorizationFlow, AuthorizationError> {
    let mut flow = AuthorizationFlow {
        client: ClientMetadata::new(String::new()),
        request,
        redirect_uri: String::new(),
        response_mode: ResponseMode::Query,
        session: None,
        state: FlowState::Received,
    };

    // Unknown client: no redirect URI can be trusted, respond directly
    let Some(client) = directory.get_client(&flow.request.client_id) else {
        tracing::warn!(client_id = %flow.request.client_id, "authorization for unknown client");
        return Err(AuthorizationError::direct(
            AuthorizeError::UnauthorizedClient(format!(
                "unknown client '{}'",
                flow.request.client_id
            )),
        ));
    };
    flow.client = client;

    // Resolve the redirect URI before anything can travel by redirect
    flow.redirect_uri = match &flow.request.redirect_uri {
        Some(uri) => {
            if !flow.client.has_redirect_uri(uri) {
                return Err(AuthorizationError::direct(AuthorizeError::InvalidRequest(
                    "redirect_uri is not registered for this client".to_string(),
                )));
            }
            uri.clone()
        }
        None => {
            // Omission is tolerated only when unambiguous and trusted
            if flow.client.trusted && flow.client.redirect_uris.len() == 1 {
                flow.client.redirect_uris[0].clone()
            } else {
                return Err(AuthorizationError::direct(AuthorizeError::InvalidRequest(
                    "redirect_uri is required".to_string(),
                )));
            }
        }
    };
    flow.response_mode = flow.request.effective_response_mode();

    if let Err(error) = flow.check_request() {
        return Err(flow.redirect_error(error));
    }

    flow.state = FlowState::RequestValidated;
    tracing::debug!(
        client_id = %flow.client.client_id,
        response_type = %flow.request.response_types,
        "authorization request validated"
    );
    Ok(flow)
}

/// One authorization transaction moving through the flow states.
#[derive(Debug)]
pub struct AuthorizationFlow {
    client: ClientMetadata,
    request: AuthorizationRequest,
    redirect_uri: String,
    response_mode: ResponseMode,
    session: Option<Session>,
    state: FlowState,
}

impl AuthorizationFlow {
    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> FlowState {
        self.state
    }

    /// Returns the validated request.
    #[must_use]
    pub const fn request(&self) -> &AuthorizationRequest {
        &self.request
    }

    /// Returns the client registration.
    #[must_use]
    pub const fn client(&self) -> &ClientMetadata {
        &self.client
    }

    /// Returns the resolved redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the effective response mode.
    #[must_use]
    pub const fn response_mode(&self) -> ResponseMode {
        self.response_mode
    }

    /// Post-redirect validation of the request itself.
    fn check_request(&self) -> Result<(), AuthorizeError> {
        let request = &self.request;

        if !self.client.allows_response_types(&request.response_types) {
            return Err(AuthorizeError::UnauthorizedClient(format!(
                "client is not registered for response_type '{}'",
                request.response_types
            )));
        }
        if request.scope.is_empty() {
            return Err(AuthorizeError::InvalidScope("scope is required".to_string()));
        }
        if request.response_types.contains(ResponseType::IdToken) && !request.is_oidc() {
            return Err(AuthorizeError::InvalidScope(
                "id_token requires the openid scope".to_string(),
            ));
        }
        if request.is_oidc()
            && (request.response_types.is_implicit_flow()
                || request.response_types.is_hybrid_flow())
            && request.nonce.is_none()
        {
            return Err(AuthorizeError::InvalidRequest(
                "nonce is required for implicit and hybrid flows".to_string(),
            ));
        }
        // Defense against requests built without the builder's checks
        if request.is_prompt_none() && request.prompt.len() > 1 {
            return Err(AuthorizeError::InvalidRequest(
                "prompt=none cannot be combined with other prompt values".to_string(),
            ));
        }

        Ok(())
    }

    /// Wraps an error with this flow's redirect disposition.
    #[must_use]
    pub fn redirect_error(&self, error: AuthorizeError) -> AuthorizationError {
        AuthorizationError {
            error,
            disposition: ErrorDisposition::Redirect {
                redirect_uri: self.redirect_uri.clone(),
                response_mode: self.response_mode,
                state: self.request.state.clone(),
            },
        }
    }

    /// `RequestValidated → {AwaitingAuthentication, AwaitingConsent,
    /// Granted}` based on the session and prompt semantics.
    ///
    /// # Errors
    ///
    /// `prompt=none` yields `login_required`/`consent_required` via
    /// redirect when the session or consent is missing.
    pub fn begin(
        &mut self,
        session: Option<Session>,
        now: DateTime<Utc>,
    ) -> Result<Interaction, AuthorizationError> {
        if self.state != FlowState::RequestValidated {
            return Err(AuthorizationError::direct(AuthorizeError::ServerError(
                format!("begin called in {:?}", self.state),
            )));
        }

        let usable = session.filter(|s| !self.session_stale(s, now));

        if self.request.is_prompt_none() {
            let Some(session) = usable else {
                return Err(self.redirect_error(AuthorizeError::LoginRequired));
            };
            if self.consent_needed(&session) {
                return Err(self.redirect_error(AuthorizeError::ConsentRequired));
            }
            self.session = Some(session);
            self.state = FlowState::Granted;
            return Ok(Interaction::None);
        }

        let Some(session) = usable.filter(|_| !self.request.forces_login()) else {
            self.state = FlowState::AwaitingAuthentication;
            return Ok(Interaction::Authenticate);
        };

        self.continue_with_session(session)
    }

    /// `AwaitingAuthentication → {AwaitingConsent, Granted}` after the
    /// collaborator authenticated the resource owner.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when called out of state.
    pub fn authenticated(&mut self, session: Session) -> Result<Interaction, AuthorizationError> {
        if self.state != FlowState::AwaitingAuthentication {
            return Err(AuthorizationError::direct(AuthorizeError::ServerError(
                format!("authenticated called in {:?}", self.state),
            )));
        }
        self.continue_with_session(session)
    }

    fn continue_with_session(
        &mut self,
        session: Session,
    ) -> Result<Interaction, AuthorizationError> {
        let needs_consent = self.consent_needed(&session);
        self.session = Some(session);
        if needs_consent {
            self.state = FlowState::AwaitingConsent;
            Ok(Interaction::Consent)
        } else {
            self.state = FlowState::Granted;
            Ok(Interaction::None)
        }
    }

    /// `AwaitingConsent → Granted`.
    ///
    /// Recording the consent in the session store is the collaborator's
    /// job; the flow only transitions.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when called out of state.
    pub fn grant(&mut self) -> Result<(), AuthorizationError> {
        if self.state != FlowState::AwaitingConsent {
            return Err(AuthorizationError::direct(AuthorizeError::ServerError(
                format!("grant called in {:?}", self.state),
            )));
        }
        self.state = FlowState::Granted;
        Ok(())
    }

    /// `Decided(Denied)`: consumes the flow into the `access_denied`
    /// redirect with `state` echoed unchanged.
    #[must_use]
    pub fn deny(mut self) -> AuthorizationError {
        self.state = FlowState::Denied;
        tracing::debug!(client_id = %self.client.client_id, "authorization denied");
        self.redirect_error(AuthorizeError::AccessDenied)
    }

    /// `Granted → ResponseAssembled`: mints the granted artifacts.
    ///
    /// Order is fixed (code, then access token, then ID Token) so the
    /// binding hashes cover the final artifact bytes.
    ///
    /// # Errors
    ///
    /// Minting failures surface as `server_error` via redirect.
    pub fn assemble(
        mut self,
        issuer: &TokenIssuer,
        profile: Option<&UserProfile>,
    ) -> Result<AuthorizationResponse, AuthorizationError> {
        if self.state != FlowState::Granted {
            return Err(AuthorizationError::direct(AuthorizeError::ServerError(
                format!("assemble called in {:?}", self.state),
            )));
        }
        let Some(session) = self.session.clone() else {
            return Err(AuthorizationError::direct(AuthorizeError::ServerError(
                "granted flow has no session".to_string(),
            )));
        };

        let subject = subject_for_client(&session.subject, &self.client);
        let types = &self.request.response_types;

        let code = types
            .contains(ResponseType::Code)
            .then(generate_authorization_code);

        let (access_token, expires_in) = if types.contains(ResponseType::Token) {
            let claims = issuer
                .new_access_token_claims(&subject)
                .with_azp(self.client.client_id.clone())
                .with_scope(self.request.scope_string())
                .with_session(session.id.clone());
            let token = issuer
                .mint_access_token(&claims)
                .map_err(|e| self.redirect_error(e))?;
            (Some(token), Some(issuer.config().access_token_lifespan))
        } else {
            (None, None)
        };

        let id_token = if types.contains(ResponseType::IdToken) {
            let claims = self.id_token_claims(
                issuer,
                &subject,
                &session,
                code.as_deref(),
                access_token.as_deref(),
                profile,
            );
            Some(
                issuer
                    .mint_id_token(&claims, &self.client)
                    .map_err(|e| self.redirect_error(e))?,
            )
        } else {
            None
        };

        self.state = FlowState::ResponseAssembled;
        tracing::debug!(
            client_id = %self.client.client_id,
            code = code.is_some(),
            access_token = access_token.is_some(),
            id_token = id_token.is_some(),
            "authorization response assembled"
        );

        Ok(AuthorizationResponse {
            code,
            token_type: access_token.as_ref().map(|_| "Bearer".to_string()),
            access_token,
            expires_in,
            id_token,
            state: self.request.state.clone(),
            scope: Some(self.request.scope_string()),
        })
    }

    /// Builds the ID Token claim set, binding hashes last.
    fn id_token_claims(
        &self,
        issuer: &TokenIssuer,
        subject: &str,
        session: &Session,
        code: Option<&str>,
        access_token: Option<&str>,
        profile: Option<&UserProfile>,
    ) -> IdTokenClaims {
        let alg = self.client.id_token_signed_response_alg;
        let mut claims = issuer
            .new_id_token_claims(subject, &self.client.client_id)
            .with_auth_time(session.authenticated_at.timestamp())
            .with_session(session.id.clone());

        if let Some(nonce) = &self.request.nonce {
            claims = claims.with_nonce(nonce.clone());
        }
        if let Some(acr) = self.request.acr_values.first() {
            claims = claims.with_acr(acr.clone());
        }
        if let Some(code) = code {
            claims = claims.with_c_hash(binding_hash(alg, code));
        }
        if let Some(token) = access_token {
            claims = claims.with_at_hash(binding_hash(alg, token));
        }

        // Requested ID Token claims the resource owner actually has
        if let (Some(requested), Some(profile)) = (&self.request.claims, profile) {
            for (name, _constraint) in &requested.id_token {
                if let Some(value) = profile.claims.get(name) {
                    claims = claims.with_claim(name.clone(), value.clone());
                }
            }
        }

        claims
    }

    fn session_stale(&self, session: &Session, now: DateTime<Utc>) -> bool {
        self.request
            .max_age
            .is_some_and(|max_age| session.age_seconds(now) > max_age)
    }

    fn consent_needed(&self, session: &Session) -> bool {
        if self.request.forces_consent() {
            return true;
        }
        if self.client.trusted {
            return false;
        }
        !session.has_consent(&self.client.client_id, &self.request.scope)
    }
}

/// Generates an authorization code.
fn generate_authorization_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
