//! HTTP sessions and transport adapter registrations
//!
//! A [`Session`] is the HTTP-capable object an auth strategy hands to the
//! executor: a default `reqwest` client configured with redirect following
//! disabled, plus any caller-supplied [`AdapterRegistration`]s. Adapters
//! route requests whose URL matches a prefix through an alternative client,
//! which is the interception hook used for scheme-specific routing and
//! testing.

use std::time::Duration;

use crate::error::{MetaregError, Result};

/// A transport adapter: requests whose URL starts with `prefix` are sent
/// through `client` instead of the session's default client.
#[derive(Debug, Clone)]
pub struct AdapterRegistration {
    /// URL prefix the adapter is mounted on, e.g. `"http://mock-registry"`.
    pub prefix: String,
    /// The client handling requests under that prefix.
    pub client: reqwest::Client,
}

impl AdapterRegistration {
    /// Mounts `client` on the given URL prefix.
    pub fn new(prefix: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            prefix: prefix.into(),
            client,
        }
    }
}

/// An HTTP session owned by one auth strategy.
///
/// Redirect following is disabled on the default client so that redirect
/// responses surface to the executor instead of being chased silently.
/// Adapter clients keep whatever policy they were built with.
#[derive(Debug, Clone)]
pub struct Session {
    client: reqwest::Client,
    adapters: Vec<AdapterRegistration>,
}

impl Session {
    /// Builds a session whose default client uses `timeout` per request.
    ///
    /// # Errors
    ///
    /// Returns [`MetaregError::Config`] when the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| MetaregError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            adapters: Vec::new(),
        })
    }

    /// Mounts caller-supplied adapters onto this session.
    ///
    /// No-op when `adapters` is empty.
    pub fn mount(&mut self, adapters: &[AdapterRegistration]) {
        self.adapters.extend_from_slice(adapters);
    }

    /// Selects the client responsible for `url`.
    ///
    /// The adapter with the longest matching prefix wins; with no match the
    /// session's default client is used.
    pub fn client_for(&self, url: &str) -> &reqwest::Client {
        match self.adapter_for(url) {
            Some(index) => &self.adapters[index].client,
            None => &self.client,
        }
    }

    /// Index of the adapter with the longest prefix matching `url`.
    fn adapter_for(&self, url: &str) -> Option<usize> {
        self.adapters
            .iter()
            .enumerate()
            .filter(|(_, a)| url.starts_with(&a.prefix))
            .max_by_key(|(_, a)| a.prefix.len())
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_for_without_adapters_uses_default() {
        let session = Session::new(Duration::from_secs(1)).expect("session");
        // No adapters mounted, any URL resolves to the default client.
        let _client = session.client_for("http://example.com/data");
        assert!(session.adapters.is_empty());
    }

    #[test]
    fn test_mount_with_empty_list_is_noop() {
        let mut session = Session::new(Duration::from_secs(1)).expect("session");
        session.mount(&[]);
        assert!(session.adapters.is_empty());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut session = Session::new(Duration::from_secs(1)).expect("session");
        session.mount(&[
            AdapterRegistration::new("http://", reqwest::Client::new()),
            AdapterRegistration::new("http://registry", reqwest::Client::new()),
        ]);

        assert_eq!(session.adapter_for("http://registry/services/meta"), Some(1));
        assert_eq!(session.adapter_for("http://elsewhere/data"), Some(0));
        assert_eq!(session.adapter_for("ftp://registry"), None);
    }
}
