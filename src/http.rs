//! HTTP execution: one logical call with auth, retry and classification
//!
//! [`HttpExecutor`] composes an [`AuthStrategy`] and a [`BackoffSpec`] into
//! a single `request` operation: it lazily creates the session, signs and
//! submits the transport call with redirect following disabled, classifies
//! the outcome into the typed error taxonomy, and retries transient
//! failures transparently. Callers only ever observe a
//! [`ResponseEnvelope`] or a terminal [`MetaregError`].

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::auth::{AuthStrategy, Session};
use crate::backoff::{run_with_backoff, BackoffSpec};
use crate::error::{MetaregError, Result};
use crate::pagination::PageIterator;

pub use reqwest::Method;

/// Default per-attempt timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(240);

// ---------------------------------------------------------------------------
// ResponseEnvelope
// ---------------------------------------------------------------------------

/// Parsed response body.
///
/// JSON when the response content type says so, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body decoded as JSON.
    Json(serde_json::Value),
    /// Body kept as raw text.
    Text(String),
}

impl ResponseBody {
    /// The decoded JSON value, if the body was JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// The raw text, if the body was not JSON.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }
}

/// A normalized HTTP response.
///
/// Immutable after construction and owned solely by the caller that
/// receives it.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// The HTTP status code.
    pub status_code: u16,
    /// The parsed body.
    pub data: ResponseBody,
    /// The resource name the caller supplied with the request, verbatim.
    pub resource_name: Option<String>,
    /// Response headers (header names lowercased by the transport).
    pub headers: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// RequestOptions
// ---------------------------------------------------------------------------

/// Optional parts of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Raw request body.
    pub body: Option<String>,
    /// Extra headers, merged over the executor's defaults.
    pub headers: Option<HashMap<String, String>>,
    /// Query parameters.
    pub params: Option<Vec<(String, String)>>,
    /// Name of the resource this request concerns, echoed back on the
    /// envelope.
    pub resource_name: Option<String>,
}

// ---------------------------------------------------------------------------
// HttpExecutor
// ---------------------------------------------------------------------------

/// Performs logical HTTP calls against the registry.
///
/// The session is created lazily on the first request via the auth
/// strategy, which may trigger a credential exchange as a side effect.
/// Every call is wrapped by the configured backoff policy.
///
/// # Examples
///
/// ```no_run
/// use metareg::auth::{AuthFactory, AuthOptions, AuthType};
/// use metareg::http::{HttpExecutor, Method, RequestOptions};
///
/// # async fn example() -> metareg::Result<()> {
/// let auth = AuthFactory::get_auth(AuthOptions {
///     auth_type: AuthType::ByoToken,
///     byo_token: Some("tok".to_string()),
///     ..Default::default()
/// })?;
/// let executor = HttpExecutor::new(auth);
/// let envelope = executor
///     .request(Method::GET, "http://registry/data/services", RequestOptions::default())
///     .await?;
/// println!("status {}", envelope.status_code);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpExecutor {
    auth: Box<dyn AuthStrategy>,
    session: tokio::sync::Mutex<Option<Session>>,
    backoff: BackoffSpec,
    timeout: Duration,
    default_headers: HashMap<String, String>,
}

impl HttpExecutor {
    /// Creates an executor with the default timeout and backoff policy.
    pub fn new(auth: Box<dyn AuthStrategy>) -> Self {
        let default_headers = HashMap::from([
            (
                "User-Agent".to_string(),
                concat!("metareg/", env!("CARGO_PKG_VERSION")).to_string(),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]);
        Self {
            auth,
            session: tokio::sync::Mutex::new(None),
            backoff: BackoffSpec::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            default_headers,
        }
    }

    /// Replaces the retry policy.
    pub fn with_backoff(mut self, backoff: BackoffSpec) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds or replaces a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Forces a credential refresh on the auth strategy.
    ///
    /// Token invalidation is caller-driven; this is the invalidation hook.
    pub async fn refresh_token(&self) -> Result<()> {
        self.auth.refresh_token(self.timeout).await
    }

    /// Performs one logical call.
    ///
    /// Ensures a session exists, submits the request with redirects
    /// disabled and the configured timeout, and classifies the outcome.
    /// Transient failures are retried per the backoff policy; the caller
    /// sees either an envelope or the final typed error.
    ///
    /// # Errors
    ///
    /// One of [`MetaregError::Connection`], [`MetaregError::Timeout`],
    /// [`MetaregError::TooManyRedirects`], [`MetaregError::Http`] (status
    /// 400 and above) or, during lazy session creation,
    /// [`MetaregError::Authorization`].
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResponseEnvelope> {
        let session = self.ensure_session().await?;
        let target = format!("{} {}", method, url);
        run_with_backoff(&self.backoff, &target, || {
            self.execute_once(&session, method.clone(), url, &options)
        })
        .await
    }

    /// `GET` convenience wrapper around [`HttpExecutor::request`].
    pub async fn get(&self, url: &str) -> Result<ResponseEnvelope> {
        self.request(Method::GET, url, RequestOptions::default())
            .await
    }

    /// `POST` convenience wrapper around [`HttpExecutor::request`].
    pub async fn post(&self, url: &str, body: impl Into<String>) -> Result<ResponseEnvelope> {
        self.request(
            Method::POST,
            url,
            RequestOptions {
                body: Some(body.into()),
                ..Default::default()
            },
        )
        .await
    }

    /// Starts a lazy page sequence for a listing endpoint.
    ///
    /// See [`PageIterator`] for the continuation-token protocol.
    pub fn paginate(
        &self,
        method: Method,
        url: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> PageIterator<'_> {
        PageIterator::new(self, method, url, params)
    }

    /// Returns the cached session, creating it on first use.
    ///
    /// A strategy that declines to produce a session (unauthenticated
    /// without adapters) falls back to a plain session.
    async fn ensure_session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = match self.auth.create_session(self.timeout).await? {
            Some(session) => session,
            None => Session::new(self.timeout)?,
        };
        debug!("session created");
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Submits a single attempt and classifies its outcome.
    async fn execute_once(
        &self,
        session: &Session,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<ResponseEnvelope> {
        let mut builder = session
            .client_for(url)
            .request(method, url)
            .timeout(self.timeout);

        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        if let Some(headers) = &options.headers {
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
        }
        if let Some(params) = &options.params {
            builder = builder.query(params);
        }
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }
        builder = self.auth.sign(builder);

        let response = builder.send().await.map_err(MetaregError::from_transport)?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let is_json = headers
            .get("content-type")
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let text = response.text().await.map_err(MetaregError::from_transport)?;

        if status >= 400 {
            return Err(MetaregError::Http {
                status_code: status,
                message: text,
            });
        }

        let data = if is_json {
            match serde_json::from_str(&text) {
                Ok(value) => ResponseBody::Json(value),
                // A JSON content type over a malformed body: keep the text
                // so the caller can still inspect it.
                Err(_) => ResponseBody::Text(text),
            }
        } else {
            ResponseBody::Text(text)
        };

        Ok(ResponseEnvelope {
            status_code: status,
            data,
            resource_name: options.resource_name.clone(),
            headers,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
