//! Access tokens and the process-wide token cache
//!
//! [`AuthToken`] is an immutable token value as returned by the token
//! endpoint. [`TokenCache`] maps (client identity, token endpoint) pairs to
//! tokens so that several strategies for the same credentials share one
//! token instead of each performing its own exchange.
//!
//! The cache is an injectable handle rather than a global: cloning it is
//! cheap and every clone refers to the same storage, so tests can hand each
//! scenario its own isolated cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AuthToken
// ---------------------------------------------------------------------------

/// An access token plus its type, as issued by the token endpoint.
///
/// Immutable once created. Produced either by decoding a token-endpoint
/// JSON response or by wrapping a caller-supplied string via
/// [`AuthToken::bearer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// The token type, typically `"bearer"`.
    pub token_type: String,
    /// The access token string issued by the authorization server.
    pub access_token: String,
}

impl AuthToken {
    /// Wraps a literal access token as a bearer token.
    ///
    /// This is the bring-your-own-token path: no exchange is performed and
    /// the token type is fixed to `"bearer"`.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            token_type: "bearer".to_string(),
            access_token: access_token.into(),
        }
    }

    /// Renders the `Authorization` header value for this token.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// ---------------------------------------------------------------------------
// TokenCache
// ---------------------------------------------------------------------------

/// Entries for a single client identity, keyed by token endpoint URL.
type IdentityTokens = HashMap<String, AuthToken>;

/// Process-lifetime cache of fetched or supplied tokens.
///
/// Keyed two levels deep -- by client identity, then by token endpoint --
/// so one client can hold tokens for several endpoints. Each identity's
/// entries sit behind their own mutex: writers for unrelated identities
/// never contend, while reads and writes for the same (identity, endpoint)
/// pair are mutually exclusive.
///
/// Entries are overwritten whole on refresh, never merged. No expiry is
/// tracked; invalidation happens when a caller forces a refresh.
///
/// # Examples
///
/// ```
/// use metareg::auth::{AuthToken, TokenCache};
///
/// let cache = TokenCache::new();
/// cache.add_token("user", "http://identity", AuthToken::bearer("1234"));
/// let token = cache.get_token("user", "http://identity");
/// assert_eq!(token.unwrap().access_token, "1234");
/// assert!(cache.get_token("user", "http://other").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    storage: Arc<RwLock<HashMap<String, Arc<Mutex<IdentityTokens>>>>>,
}

impl TokenCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding `identity`'s entries, creating it on
    /// first use.
    fn identity_slot(&self, identity: &str) -> Arc<Mutex<IdentityTokens>> {
        {
            let storage = self.storage.read().expect("token cache lock poisoned");
            if let Some(slot) = storage.get(identity) {
                return Arc::clone(slot);
            }
        }
        let mut storage = self.storage.write().expect("token cache lock poisoned");
        Arc::clone(
            storage
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(HashMap::new()))),
        )
    }

    /// Stores `token` under (`identity`, `endpoint`), overwriting any
    /// previous entry for that pair.
    pub fn add_token(&self, identity: &str, endpoint: &str, token: AuthToken) {
        let slot = self.identity_slot(identity);
        let mut tokens = slot.lock().expect("token cache lock poisoned");
        tokens.insert(endpoint.to_string(), token);
    }

    /// Looks up the token stored under (`identity`, `endpoint`).
    ///
    /// A missing key is an ordinary outcome, not an error.
    pub fn get_token(&self, identity: &str, endpoint: &str) -> Option<AuthToken> {
        let slot = {
            let storage = self.storage.read().expect("token cache lock poisoned");
            Arc::clone(storage.get(identity)?)
        };
        let tokens = slot.lock().expect("token cache lock poisoned");
        tokens.get(endpoint).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
