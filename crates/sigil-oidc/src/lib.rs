//! # sigil-oidc
//!
//! `OpenID` Connect authorization core for the Sigil provider.
//!
//! Validates authorization requests (including signed/encrypted request
//! objects), drives the resource-owner interaction state machine, and
//! assembles responses whose code, access token, and ID Token are bound
//! together by `c_hash`/`at_hash`. Token crypto is delegated to
//! [`sigil_jose`].
//!
//! HTTP transport, client registration storage, session UI, and
//! persistence are collaborators behind the [`client::ClientDirectory`]
//! and [`session::SessionStore`] traits.
//!
//! ## Modules
//!
//! - [`types`] - response types, prompts, response modes
//! - [`claims`] - claim values, claim-request constraints, token claims
//! - [`client`] - client registration metadata contract
//! - [`session`] - resource-owner session contract and per-session locks
//! - [`request`] - the authorization request and its builder
//! - [`request_object`] - JAR validation and merging
//! - [`authorize`] - the authorization state machine
//! - [`mint`] - access token and ID Token issuance
//! - [`userinfo`] - UserInfo claim release and minting
//! - [`error`] - RFC 6749 error taxonomy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod authorize;
pub mod claims;
pub mod client;
pub mod error;
pub mod mint;
pub mod request;
pub mod request_object;
pub mod session;
pub mod types;
pub mod userinfo;

pub use authorize::{
    redirect_location, validate_authorization_request, AuthorizationError, AuthorizationFlow,
    AuthorizationResponse, ErrorDisposition, FlowState, Interaction,
};
pub use claims::{AccessTokenClaims, ClaimRequest, ClaimValue, ClaimsRequest, IdTokenClaims};
pub use client::{ClientDirectory, ClientMetadata, InMemoryClientDirectory};
pub use error::{AuthorizeError, AuthorizeResult, ErrorResponse};
pub use mint::{binding_hash, subject_for_client, IssuerConfig, TokenIssuer};
pub use request::{AuthorizationRequest, AuthorizationRequestBuilder};
pub use request_object::RequestObjectProcessor;
pub use session::{InMemorySessionStore, Session, SessionLocks, SessionStore};
pub use types::{Display, Prompt, ResponseMode, ResponseType, ResponseTypes, SubjectType};
pub use userinfo::{build_userinfo_claims, UserInfoResponse, UserProfile};
