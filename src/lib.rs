//! Metareg - client SDK for a REST metadata/registry platform
//!
//! This library implements the request-execution pipeline shared by every
//! registry operation: authentication-strategy selection and token
//! lifecycle, retry/backoff with error classification, and
//! continuation-token pagination.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: authentication strategies, token cache and HTTP sessions
//! - `backoff`: retry policy and the `run_with_backoff` combinator
//! - `http`: the request executor and response envelope
//! - `pagination`: lazy continuation-token page sequences
//! - `error`: typed error taxonomy and result alias
//!
//! # Example
//!
//! ```no_run
//! use metareg::auth::{AuthFactory, AuthOptions};
//! use metareg::http::{HttpExecutor, Method, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> metareg::Result<()> {
//!     let auth = AuthFactory::get_auth(AuthOptions {
//!         grant_client_id: Some("metadata-workflow".to_string()),
//!         grant_client_secret: Some("secret".to_string()),
//!         token_url: Some("http://identity/oauth/token".to_string()),
//!         ..Default::default()
//!     })?;
//!
//!     let executor = HttpExecutor::new(auth);
//!     let envelope = executor
//!         .request(Method::GET, "http://registry/data/services", RequestOptions::default())
//!         .await?;
//!     println!("{:?}", envelope.data);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod backoff;
pub mod error;
pub mod http;
pub mod pagination;

// Re-export commonly used types
pub use auth::{
    AdapterRegistration, AuthFactory, AuthOptions, AuthStrategy, AuthToken, AuthType, Session,
    TokenCache,
};
pub use backoff::{run_with_backoff, BackoffSpec, WaitGenerator};
pub use error::{MetaregError, Result};
pub use http::{HttpExecutor, Method, RequestOptions, ResponseBody, ResponseEnvelope};
pub use pagination::PageIterator;
