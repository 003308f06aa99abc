//! # sigil-jose
//!
//! JOSE token engine for the Sigil `OpenID` Connect provider.
//!
//! Builds, signs, verifies, encrypts, and decrypts compact-serialized
//! tokens (JWS/JWE) across the registered algorithm families, given a key
//! source: a shared secret, a keystore-backed asymmetric key, or a remote
//! JWK set.
//!
//! Every operation is stateless per call and depends only on its explicit
//! inputs; the only shared mutable resource is the [`resolver::JwksCache`]
//! in front of the injected fetch capability.
//!
//! ## Modules
//!
//! - [`algorithm`] - JWA registry and the `none` policy gate
//! - [`hash`] - digests and the OIDC half-hash (`at_hash`/`c_hash`)
//! - [`jwk`] - JSON Web Key and JWK Set model
//! - [`keys`] - asymmetric key material and the server keystore
//! - [`jws`] - compact JWS parse/sign/verify
//! - [`jwe`] - compact JWE encrypt/decrypt
//! - [`resolver`] - cached remote JWK set resolution
//! - [`error`] - engine error taxonomy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod jwe;
pub mod jwk;
pub mod jws;
pub mod keys;
pub mod resolver;

pub use algorithm::{
    ContentEncryptionAlgorithm, EllipticCurve, HashAlgorithm, JwsPolicy, KeyManagementAlgorithm,
    SignatureAlgorithm, SignatureFamily,
};
pub use error::{JoseError, JoseResult};
pub use jwe::{DecryptedJwe, JweDecryptionKey, JweHeader, JweRecipientKey};
pub use jwk::{JsonWebKey, JsonWebKeySet, KeyType, KeyUse};
pub use jws::{CompactJws, JwsHeader, SigningKeySource, VerificationKeySource};
pub use keys::{EcdsaSigningKey, KeyStore, RsaSigningKey, ServerKey};
pub use resolver::{JwksCache, JwksFetcher};
