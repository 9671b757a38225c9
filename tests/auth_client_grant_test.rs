//! Client-credentials grant integration tests using wiremock
//!
//! Verifies the token lifecycle in `src/auth/mod.rs`:
//!
//! - The exchange POSTs the OAuth2 client-credentials form with HTTP Basic
//!   authentication and stores the result in the token cache.
//! - A supplied or cached token suppresses the exchange entirely.
//! - `refresh_token` exchanges unconditionally and overwrites the cache.
//! - A protocol-level rejection surfaces as an authorization error.

use std::time::Duration;

use base64::Engine as _;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use metareg::auth::{AuthStrategy, AuthToken, ClientGrantAuth, TokenCache};
use metareg::MetaregError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TIMEOUT: Duration = Duration::from_secs(5);

/// The `Authorization` header value for HTTP Basic with `user:pass`.
fn basic_auth_header(user: &str, pass: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
    format!("Basic {}", encoded)
}

/// Token endpoint response issuing `access_token`.
fn token_response(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "token_type": "bearer",
        "access_token": access_token,
    }))
}

// ---------------------------------------------------------------------------
// Exchange on session creation
// ---------------------------------------------------------------------------

/// With no supplied or cached token, session creation performs exactly one
/// exchange: HTTP Basic credentials, client-credentials grant body, and the
/// result lands in both the strategy and the cache.
#[tokio::test]
async fn test_cache_miss_triggers_exactly_one_exchange() {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("Authorization", basic_auth_header("user", "pass")))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(token_response("789"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TokenCache::new();
    let auth = ClientGrantAuth::new("user", "pass", token_url.clone(), None, cache.clone());
    assert!(auth.token().is_none());

    let session = auth.create_session(TIMEOUT).await.expect("create_session");
    assert!(session.is_some());

    assert_eq!(auth.token(), Some(AuthToken::bearer("789")));
    assert_eq!(
        cache.get_token("user", &token_url),
        Some(AuthToken::bearer("789"))
    );
}

/// A strategy constructed with an explicit token never talks to the token
/// endpoint.
#[tokio::test]
async fn test_supplied_token_suppresses_exchange() {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("should-not-be-fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let auth = ClientGrantAuth::new(
        "user",
        "pass",
        token_url,
        Some("1234".to_string()),
        TokenCache::new(),
    );
    let session = auth.create_session(TIMEOUT).await.expect("create_session");
    assert!(session.is_some());
    assert_eq!(auth.token(), Some(AuthToken::bearer("1234")));
}

/// A cache hit for the (identity, endpoint) pair also suppresses the
/// exchange.
#[tokio::test]
async fn test_cached_token_suppresses_exchange() {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("should-not-be-fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let cache = TokenCache::new();
    cache.add_token("user", &token_url, AuthToken::bearer("567"));

    let auth = ClientGrantAuth::new("user", "pass", token_url, None, cache);
    auth.create_session(TIMEOUT).await.expect("create_session");
    assert_eq!(auth.token(), Some(AuthToken::bearer("567")));
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// `refresh_token` performs the exchange even when a token is already held,
/// replacing both the held token and the cache entry.
#[tokio::test]
async fn test_refresh_exchanges_unconditionally() {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("fresh"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TokenCache::new();
    let auth = ClientGrantAuth::new(
        "user",
        "pass",
        token_url.clone(),
        Some("stale".to_string()),
        cache.clone(),
    );
    auth.create_session(TIMEOUT).await.expect("create_session");

    auth.refresh_token(TIMEOUT).await.expect("refresh");

    assert_eq!(auth.token(), Some(AuthToken::bearer("fresh")));
    assert_eq!(
        cache.get_token("user", &token_url),
        Some(AuthToken::bearer("fresh"))
    );
}

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

/// A protocol-level rejection by the authorization server surfaces as an
/// authorization error carrying the server's message.
#[tokio::test]
async fn test_rejected_exchange_is_an_authorization_error() {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_client"}"#),
        )
        .mount(&server)
        .await;

    let auth = ClientGrantAuth::new("user", "pass", token_url, None, TokenCache::new());
    let err = auth
        .create_session(TIMEOUT)
        .await
        .expect_err("exchange must fail");

    match err {
        MetaregError::Authorization { message, .. } => {
            assert!(message.contains("invalid_client"), "message: {}", message);
        }
        other => panic!("expected authorization error, got {:?}", other),
    }
}

/// An unparseable token response is also an authorization failure, with the
/// decode error preserved as the cause.
#[tokio::test]
async fn test_malformed_token_response_is_an_authorization_error() {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("not json")
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    let auth = ClientGrantAuth::new("user", "pass", token_url, None, TokenCache::new());
    let err = auth
        .create_session(TIMEOUT)
        .await
        .expect_err("decode must fail");

    match err {
        MetaregError::Authorization { cause, .. } => assert!(cause.is_some()),
        other => panic!("expected authorization error, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Cache sharing across strategies
// ---------------------------------------------------------------------------

/// Two strategies for the same (identity, endpoint) pair share one token:
/// the second never exchanges.
#[tokio::test]
async fn test_second_strategy_reuses_cached_token() {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth/token", server.uri());

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("shared"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TokenCache::new();
    let first = ClientGrantAuth::new("user", "pass", token_url.clone(), None, cache.clone());
    first.create_session(TIMEOUT).await.expect("create_session");

    let second = ClientGrantAuth::new("user", "pass", token_url, None, cache);
    second
        .create_session(TIMEOUT)
        .await
        .expect("create_session");
    assert_eq!(second.token(), Some(AuthToken::bearer("shared")));
}
