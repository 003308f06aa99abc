//! End-to-end authorization flow scenarios.
//!
//! Drives the full core: request validation, the interaction state
//! machine, response assembly with binding hashes, request objects, and
//! UserInfo minting, against an in-memory client directory.

use serde_json::json;

use sigil_jose::jws::{self, CompactJws, VerificationKeySource};
use sigil_jose::{
    EcdsaSigningKey, JwsPolicy, KeyStore, ServerKey, SignatureAlgorithm,
};
use sigil_oidc::{
    binding_hash, build_userinfo_claims, validate_authorization_request, AuthorizationRequest,
    ClaimRequest, ClaimsRequest, ClientDirectory, ClientMetadata, ErrorDisposition, FlowState,
    InMemoryClientDirectory, Interaction, IssuerConfig, RequestObjectProcessor, ResponseTypes,
    Session, TokenIssuer, UserProfile,
};

const CLIENT_SECRET: &str = "functional-test-client-secret";

fn issuer() -> TokenIssuer {
    let mut keys = KeyStore::new();
    keys.add(ServerKey::Ecdsa(
        EcdsaSigningKey::generate(SignatureAlgorithm::Es256).unwrap(),
    ));
    TokenIssuer::new(
        IssuerConfig {
            issuer: "https://op.example.com".to_string(),
            signing_algorithm: SignatureAlgorithm::Es256,
            ..IssuerConfig::default()
        },
        keys,
    )
}

fn directory() -> InMemoryClientDirectory {
    let mut directory = InMemoryClientDirectory::new();
    directory.register(
        ClientMetadata::new("basic-client")
            .with_redirect_uri("https://rp.example.com/cb")
            .with_response_types("code".parse::<ResponseTypes>().unwrap())
            .with_secret(CLIENT_SECRET)
            .with_id_token_alg(SignatureAlgorithm::Hs256),
    );
    directory.register(
        ClientMetadata::new("hybrid-client")
            .with_redirect_uri("https://rp.example.com/cb")
            .with_response_types("token id_token".parse::<ResponseTypes>().unwrap())
            .with_response_types("code id_token".parse::<ResponseTypes>().unwrap())
            .with_secret(CLIENT_SECRET)
            .with_id_token_alg(SignatureAlgorithm::Hs256),
    );
    directory
}

fn profile() -> UserProfile {
    UserProfile::new("user-1")
        .with_claim("name", json!("Ada Lovelace"))
        .with_claim("email", json!("ada@example.com"))
        .with_claim("member_of", json!(["g1", "g2", "g3"]))
}

/// authz-op-1: code flow end to end yields a code and echoes state.
#[test]
fn code_flow_end_to_end() -> anyhow::Result<()> {
    let request = AuthorizationRequest::builder("basic-client", "code".parse()?)
        .redirect_uri("https://rp.example.com/cb")
        .scope(["openid", "profile", "address", "email"])
        .state("af0ifjsldkj")
        .build()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let mut flow = validate_authorization_request(&directory(), request)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(flow.state(), FlowState::RequestValidated);

    // No session yet: the resource owner must authenticate, then consent
    let interaction = flow
        .begin(None, chrono::Utc::now())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(interaction, Interaction::Authenticate);

    let session = Session::new("user-1");
    let interaction = flow
        .authenticated(session)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(interaction, Interaction::Consent);

    flow.grant().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let response = flow
        .assemble(&issuer(), Some(&profile()))
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert!(response.code.is_some());
    assert_eq!(response.state.as_deref(), Some("af0ifjsldkj"));
    assert!(response.access_token.is_none());
    assert!(response.id_token.is_none());

    Ok(())
}

/// authz-op-2: token+id_token produces an at_hash binding the access
/// token into the ID Token.
#[test]
fn implicit_flow_binds_access_token_into_id_token() -> anyhow::Result<()> {
    let request = AuthorizationRequest::builder("hybrid-client", "token id_token".parse()?)
        .redirect_uri("https://rp.example.com/cb")
        .scope(["openid"])
        .nonce("n-0S6_WzA2Mj")
        .state("s1")
        .build()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let mut flow = validate_authorization_request(&directory(), request)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Consent was granted on a previous visit, so no interaction is left
    let mut session = Session::new("user-1");
    session.record_consent("hybrid-client", &["openid".to_string()]);
    let interaction = flow
        .begin(Some(session), chrono::Utc::now())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(interaction, Interaction::None);
    assert_eq!(flow.state(), FlowState::Granted);

    let response = flow
        .assemble(&issuer(), None)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let access_token = response.access_token.expect("access token");
    let id_token = response.id_token.expect("id token");

    let parsed = CompactJws::parse(&id_token)?;
    assert!(jws::verify_token(
        &parsed,
        &VerificationKeySource::Secret(CLIENT_SECRET.as_bytes()),
        JwsPolicy::default(),
    )?);

    let claims = parsed.claims()?;
    assert_eq!(claims["nonce"], "n-0S6_WzA2Mj");
    assert_eq!(
        claims["at_hash"],
        binding_hash(SignatureAlgorithm::Hs256, &access_token)
    );
    assert!(claims.get("c_hash").is_none());

    Ok(())
}

/// authz-op-3: hybrid code+id_token carries a c_hash over the code.
#[test]
fn hybrid_flow_binds_code_into_id_token() -> anyhow::Result<()> {
    let request = AuthorizationRequest::builder("hybrid-client", "code id_token".parse()?)
        .redirect_uri("https://rp.example.com/cb")
        .scope(["openid"])
        .nonce("n2")
        .build()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let mut flow = validate_authorization_request(&directory(), request)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let mut session = Session::new("user-1");
    session.record_consent("hybrid-client", &["openid".to_string()]);
    let interaction = flow
        .begin(Some(session), chrono::Utc::now())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(interaction, Interaction::None);

    let response = flow
        .assemble(&issuer(), None)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let code = response.code.expect("code");
    let id_token = response.id_token.expect("id token");
    let claims = CompactJws::parse(&id_token)?.claims()?;
    assert_eq!(
        claims["c_hash"],
        binding_hash(SignatureAlgorithm::Hs256, &code)
    );

    Ok(())
}

/// authz-op-4: an unregistered client gets HTTP 401 unauthorized_client
/// with no redirect.
#[test]
fn unknown_client_is_rejected_directly() -> anyhow::Result<()> {
    let request = AuthorizationRequest::builder("nobody", "code".parse()?)
        .redirect_uri("https://rp.example.com/cb")
        .scope(["openid"])
        .build()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let error = validate_authorization_request(&directory(), request).unwrap_err();
    assert_eq!(error.http_status(), 401);
    assert_eq!(error.error.error_code(), "unauthorized_client");
    assert!(matches!(error.disposition, ErrorDisposition::Direct));

    Ok(())
}

/// authz-op-5: a signed request object's claims flow through to the
/// issued ID Token.
#[test]
fn request_object_claims_reach_the_id_token() -> anyhow::Result<()> {
    let mut claims_request = ClaimsRequest::new();
    claims_request.add_id_token_claim("member_of", ClaimRequest::essential(true));

    let payload = json!({
        "client_id": "basic-client",
        "nonce": "object-nonce",
        "claims": claims_request.to_json(),
    });
    let object = jws::encode_compact(
        sigil_jose::JwsHeader::new(SignatureAlgorithm::Hs256),
        &payload,
        &sigil_jose::SigningKeySource::Secret(CLIENT_SECRET.as_bytes()),
        JwsPolicy::default(),
    )?;

    let outer = AuthorizationRequest::builder("basic-client", "code".parse()?)
        .redirect_uri("https://rp.example.com/cb")
        .scope(["openid"])
        .request_object(&object)
        .build()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let mut client = directory().get_client("basic-client").unwrap();
    client.request_object_signing_alg = Some(SignatureAlgorithm::Hs256);
    let processor = RequestObjectProcessor::new(JwsPolicy::default());
    let merged = processor
        .process(&outer, &object, &client)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(merged.nonce.as_deref(), Some("object-nonce"));

    // Run the merged request through the flow; response_types=code only
    // produces a code, so force an ID Token via the hybrid client
    let mut merged = merged;
    merged.client_id = "hybrid-client".to_string();
    merged.response_types = "code id_token".parse()?;

    let mut flow = validate_authorization_request(&directory(), merged)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut session = Session::new("user-1");
    session.record_consent("hybrid-client", &["openid".to_string()]);
    let interaction = flow
        .begin(Some(session), chrono::Utc::now())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(interaction, Interaction::None);

    let response = flow
        .assemble(&issuer(), Some(&profile()))
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let id_token = response.id_token.expect("id token");
    let claims = CompactJws::parse(&id_token)?.claims()?;
    assert_eq!(claims["nonce"], "object-nonce");
    assert_eq!(claims["member_of"], json!(["g1", "g2", "g3"]));

    Ok(())
}

/// authz-op-6: prompt=none with a consented session completes without
/// interaction; without a session it is login_required by redirect.
#[test]
fn prompt_none_paths() -> anyhow::Result<()> {
    let build = || -> anyhow::Result<AuthorizationRequest> {
        AuthorizationRequest::builder("basic-client", "code".parse()?)
            .redirect_uri("https://rp.example.com/cb")
            .scope(["openid"])
            .prompt(vec![sigil_oidc::Prompt::None])
            .state("st")
            .build()
            .map_err(|e| anyhow::anyhow!(e.to_string()))
    };

    // Consented session: straight through
    let mut flow = validate_authorization_request(&directory(), build()?)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut session = Session::new("user-1");
    session.record_consent("basic-client", &["openid".to_string()]);
    let interaction = flow
        .begin(Some(session), chrono::Utc::now())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(interaction, Interaction::None);
    let response = flow
        .assemble(&issuer(), None)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(response.code.is_some());

    // No session: redirect with login_required, state preserved
    let mut flow = validate_authorization_request(&directory(), build()?)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let error = flow.begin(None, chrono::Utc::now()).unwrap_err();
    let location = error.location().expect("redirect");
    assert!(location.contains("error=login_required"));
    assert!(location.contains("state=st"));

    Ok(())
}

/// authz-op-7: multivalued claims survive signed and encrypted UserInfo
/// responses for several algorithm combinations.
#[test]
fn multivalued_claims_survive_userinfo_combinations() -> anyhow::Result<()> {
    let issuer = issuer();
    let mut claims_request = ClaimsRequest::new();
    claims_request.add_userinfo_claim("member_of", ClaimRequest::essential(true));

    let combos: Vec<ClientMetadata> = vec![
        ClientMetadata::new("u1")
            .with_secret(CLIENT_SECRET)
            .with_userinfo_alg(SignatureAlgorithm::Hs256),
        ClientMetadata::new("u2")
            .with_secret(CLIENT_SECRET)
            .with_userinfo_alg(SignatureAlgorithm::Es256),
        ClientMetadata::new("u3")
            .with_secret(CLIENT_SECRET)
            .with_userinfo_alg(SignatureAlgorithm::Hs512)
            .with_userinfo_encryption(
                sigil_jose::KeyManagementAlgorithm::A256Kw,
                sigil_jose::ContentEncryptionAlgorithm::A256CbcHs512,
            ),
    ];

    for client in combos {
        let claims = build_userinfo_claims(
            &profile(),
            &client,
            &["openid".to_string()],
            Some(&claims_request),
        );
        let response = issuer
            .mint_userinfo_response(claims, &client)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let token = response.as_jwt().expect("signed response");

        let payload = if token.split('.').count() == 5 {
            let kek = sigil_jose::jwe::symmetric_kek(
                CLIENT_SECRET.as_bytes(),
                sigil_jose::KeyManagementAlgorithm::A256Kw,
            )?;
            let decrypted =
                sigil_jose::jwe::decrypt(token, &sigil_jose::JweDecryptionKey::Secret(&kek))?;
            assert!(decrypted.is_nested_jws());
            CompactJws::parse(std::str::from_utf8(&decrypted.plaintext)?)?.claims()?
        } else {
            CompactJws::parse(token)?.claims()?
        };

        assert_eq!(
            payload["member_of"],
            json!(["g1", "g2", "g3"]),
            "client {}",
            client.client_id
        );
    }

    Ok(())
}
