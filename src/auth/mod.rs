//! Authentication strategies and token lifecycle
//!
//! This module covers how requests get their credentials:
//!
//! - [`AuthFactory`] selects one of three [`AuthStrategy`] implementations
//!   from an [`AuthOptions`] value: OAuth2 client-credentials grant,
//!   unauthenticated, or bring-your-own token.
//! - [`TokenCache`] shares fetched tokens across strategies keyed by
//!   (client identity, token endpoint).
//! - [`Session`] is the transport handle a strategy produces; adapter
//!   registrations let tests and scheme-specific routing intercept it.
//!
//! Strategy selection happens once, at construction; downstream code only
//! sees the trait.

pub mod session;
pub mod token_cache;

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{MetaregError, Result};

pub use session::{AdapterRegistration, Session};
pub use token_cache::{AuthToken, TokenCache};

// ---------------------------------------------------------------------------
// AuthType and AuthOptions
// ---------------------------------------------------------------------------

/// The supported authentication schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// OAuth2 client-credentials grant against a token endpoint.
    #[default]
    ClientGrant,
    /// No credentials attached to requests.
    NoAuth,
    /// A caller-supplied bearer token, used as-is.
    ByoToken,
}

/// Parameters consumed by [`AuthFactory::get_auth`].
///
/// Only the fields relevant to the chosen [`AuthType`] are read; the rest
/// are ignored.
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// Which scheme to construct.
    pub auth_type: AuthType,
    /// Client identity for the credentials grant.
    pub grant_client_id: Option<String>,
    /// Client secret for the credentials grant.
    pub grant_client_secret: Option<String>,
    /// Pre-obtained access token (used by `ByoToken`, or by `ClientGrant`
    /// to skip the initial exchange).
    pub byo_token: Option<String>,
    /// Token endpoint URL for the credentials grant.
    pub token_url: Option<String>,
    /// Cache shared between strategies; a fresh one is created when absent.
    pub token_cache: Option<TokenCache>,
}

// ---------------------------------------------------------------------------
// AuthStrategy
// ---------------------------------------------------------------------------

/// Capability surface common to all authentication schemes.
///
/// A strategy knows how to produce an HTTP [`Session`], how to refresh its
/// credentials, and how to sign an outbound request. Adapters registered
/// before session creation are mounted onto every session the strategy
/// produces.
#[async_trait]
pub trait AuthStrategy: Send + Sync + std::fmt::Debug {
    /// Creates the session used for resource requests.
    ///
    /// Returns `Ok(None)` when the scheme produces no session of its own
    /// (the executor then falls back to a plain unauthenticated session).
    /// May perform a token exchange as a side effect; see the individual
    /// implementations.
    async fn create_session(&self, timeout: Duration) -> Result<Option<Session>>;

    /// Stores transport adapters to be mounted on future sessions.
    ///
    /// No-op when `adapters` is empty.
    fn register_adapters(&mut self, adapters: Vec<AdapterRegistration>);

    /// Forces a new credential fetch.
    ///
    /// A no-op for schemes without a refreshable credential.
    async fn refresh_token(&self, timeout: Duration) -> Result<()>;

    /// Attaches credentials to an outbound request.
    ///
    /// The default implementation is the identity: useful both for
    /// unauthenticated schemes and as the interception point for custom
    /// signing (HMACs and the like).
    fn sign(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
    }
}

// ---------------------------------------------------------------------------
// AuthFactory
// ---------------------------------------------------------------------------

/// Selects and constructs an [`AuthStrategy`].
///
/// A pure factory: no side effects beyond diagnostic logging.
pub struct AuthFactory;

impl AuthFactory {
    /// Builds the strategy described by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`MetaregError::Config`] when a client-credentials grant is
    /// requested without both a client identity and secret, or without a
    /// token endpoint URL.
    pub fn get_auth(options: AuthOptions) -> Result<Box<dyn AuthStrategy>> {
        match options.auth_type {
            AuthType::ClientGrant => {
                let (client_id, client_secret) =
                    match (options.grant_client_id, options.grant_client_secret) {
                        (Some(id), Some(secret)) => (id, secret),
                        _ => {
                            return Err(MetaregError::Config(
                                "no valid authentication sources found: client-credentials \
                                 grant requires both a client identity and a secret"
                                    .to_string(),
                            ))
                        }
                    };
                let token_url = options.token_url.ok_or_else(|| {
                    MetaregError::Config(
                        "client-credentials grant requires a token endpoint URL".to_string(),
                    )
                })?;
                debug!("client credential grant scheme used");
                Ok(Box::new(ClientGrantAuth::new(
                    client_id,
                    client_secret,
                    token_url,
                    options.byo_token,
                    options.token_cache.unwrap_or_default(),
                )))
            }
            AuthType::NoAuth => {
                debug!("no auth scheme used");
                Ok(Box::new(NoAuth::default()))
            }
            AuthType::ByoToken => {
                let token = options.byo_token.ok_or_else(|| {
                    MetaregError::Config(
                        "no valid authentication sources found: BYO token scheme requires a token"
                            .to_string(),
                    )
                })?;
                debug!("BYO token scheme used");
                Ok(Box::new(ByoTokenAuth::new(token)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClientGrantAuth
// ---------------------------------------------------------------------------

/// OAuth2 client-credentials grant with cached tokens.
///
/// Construction resolves the initial token without touching the network:
/// a supplied token is adopted (and written to the cache), otherwise the
/// cache is probed. Only when neither yields a token does
/// [`AuthStrategy::create_session`] perform an exchange against the token
/// endpoint. [`AuthStrategy::refresh_token`] exchanges unconditionally.
#[derive(Debug)]
pub struct ClientGrantAuth {
    client_id: String,
    client_secret: String,
    token_url: String,
    cache: TokenCache,
    token: RwLock<Option<AuthToken>>,
    session: RwLock<Option<Session>>,
    adapters: Vec<AdapterRegistration>,
}

impl ClientGrantAuth {
    /// Creates the strategy, adopting `byo_token` or a cached token when
    /// available.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
        byo_token: Option<String>,
        cache: TokenCache,
    ) -> Self {
        let client_id = client_id.into();
        let token_url = token_url.into();
        let token = match byo_token {
            Some(raw) => {
                let token = AuthToken::bearer(raw);
                cache.add_token(&client_id, &token_url, token.clone());
                Some(token)
            }
            None => cache.get_token(&client_id, &token_url),
        };
        Self {
            client_id,
            client_secret: client_secret.into(),
            token_url,
            cache,
            token: RwLock::new(token),
            session: RwLock::new(None),
            adapters: Vec::new(),
        }
    }

    /// The token the strategy currently signs with, if any.
    pub fn token(&self) -> Option<AuthToken> {
        self.token.read().expect("token lock poisoned").clone()
    }

    /// The session used for the exchange, falling back to a fresh one when
    /// no session has been created yet.
    fn exchange_session(&self, timeout: Duration) -> Result<Session> {
        if let Some(session) = self
            .session
            .read()
            .expect("session lock poisoned")
            .as_ref()
        {
            return Ok(session.clone());
        }
        let mut session = Session::new(timeout)?;
        session.mount(&self.adapters);
        Ok(session)
    }

    /// Performs the client-credentials exchange and stores the result in
    /// the token slot and the shared cache.
    async fn fetch_token(&self, session: &Session, timeout: Duration) -> Result<()> {
        debug!(token_url = %self.token_url, "fetching token via client-credentials grant");
        let response = session
            .client_for(&self.token_url)
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| MetaregError::Authorization {
                message: format!("token request failed: {}", e),
                cause: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetaregError::Authorization {
                message: format!("token endpoint returned {}: {}", status, body),
                cause: None,
            });
        }

        let token: AuthToken =
            response
                .json()
                .await
                .map_err(|e| MetaregError::Authorization {
                    message: format!("failed to parse token response: {}", e),
                    cause: Some(Box::new(e)),
                })?;

        self.cache
            .add_token(&self.client_id, &self.token_url, token.clone());
        *self.token.write().expect("token lock poisoned") = Some(token);
        Ok(())
    }
}

#[async_trait]
impl AuthStrategy for ClientGrantAuth {
    /// Builds a session, exchanging credentials first when no token is
    /// held. With a supplied or cached token this performs no network call.
    async fn create_session(&self, timeout: Duration) -> Result<Option<Session>> {
        let mut session = Session::new(timeout)?;
        session.mount(&self.adapters);
        *self.session.write().expect("session lock poisoned") = Some(session.clone());

        if self.token().is_none() {
            self.fetch_token(&session, timeout).await?;
        }
        Ok(Some(session))
    }

    fn register_adapters(&mut self, adapters: Vec<AdapterRegistration>) {
        self.adapters.extend(adapters);
    }

    /// Exchanges credentials unconditionally, replacing the held token and
    /// the cache entry.
    async fn refresh_token(&self, timeout: Duration) -> Result<()> {
        let session = self.exchange_session(timeout)?;
        self.fetch_token(&session, timeout).await
    }

    fn sign(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => request.header(
                reqwest::header::AUTHORIZATION,
                token.authorization_header(),
            ),
            None => request,
        }
    }
}

// ---------------------------------------------------------------------------
// NoAuth
// ---------------------------------------------------------------------------

/// Unauthenticated scheme.
///
/// Produces a session only when adapters were registered (adapters are the
/// test/interception hook); otherwise the executor supplies its own plain
/// session. Refresh is a no-op and requests are not signed.
#[derive(Debug, Default)]
pub struct NoAuth {
    adapters: Vec<AdapterRegistration>,
}

impl NoAuth {
    /// Creates the unauthenticated strategy.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStrategy for NoAuth {
    async fn create_session(&self, timeout: Duration) -> Result<Option<Session>> {
        if self.adapters.is_empty() {
            return Ok(None);
        }
        let mut session = Session::new(timeout)?;
        session.mount(&self.adapters);
        Ok(Some(session))
    }

    fn register_adapters(&mut self, adapters: Vec<AdapterRegistration>) {
        self.adapters.extend(adapters);
    }

    async fn refresh_token(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ByoTokenAuth
// ---------------------------------------------------------------------------

/// Bring-your-own-token scheme.
///
/// Wraps the literal access token as a bearer token; sessions simply bind
/// it and refresh is a no-op.
#[derive(Debug)]
pub struct ByoTokenAuth {
    token: AuthToken,
    adapters: Vec<AdapterRegistration>,
}

impl ByoTokenAuth {
    /// Wraps `byo_token` as a bearer token.
    pub fn new(byo_token: impl Into<String>) -> Self {
        Self {
            token: AuthToken::bearer(byo_token),
            adapters: Vec::new(),
        }
    }
}

#[async_trait]
impl AuthStrategy for ByoTokenAuth {
    async fn create_session(&self, timeout: Duration) -> Result<Option<Session>> {
        let mut session = Session::new(timeout)?;
        session.mount(&self.adapters);
        Ok(Some(session))
    }

    fn register_adapters(&mut self, adapters: Vec<AdapterRegistration>) {
        self.adapters.extend(adapters);
    }

    async fn refresh_token(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn sign(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            self.token.authorization_header(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
