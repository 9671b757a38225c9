//! Continuation-token pagination
//!
//! [`PageIterator`] turns a listing request into a lazy, finite sequence of
//! [`ResponseEnvelope`] values, one per page. Each page is fetched only
//! when asked for, so callers can stop early without paying for pages they
//! never consume. The server drives the sequence: a page whose body carries
//! a continuation token (`meta.continue`) has a successor reached by
//! rewriting the `continue` query parameter; a page without one is the
//! last.
//!
//! Iterators are restartable only by construction; two iterators built from
//! identical initial parameters walk identical sequences.

use futures::stream::{self, Stream};

use crate::error::Result;
use crate::http::{HttpExecutor, Method, RequestOptions, ResponseEnvelope};

/// Query parameter rewritten between pages.
const CONTINUE_PARAM: &str = "continue";

/// Query parameter controlling page size.
const PER_PAGE_PARAM: &str = "perPage";

/// Lazy sequence of pages from a listing endpoint.
///
/// # Examples
///
/// ```no_run
/// use metareg::http::{HttpExecutor, Method};
///
/// # async fn example(executor: &HttpExecutor) -> metareg::Result<()> {
/// let mut pages = executor
///     .paginate(
///         Method::GET,
///         "http://registry/data/contents",
///         vec![("owner".to_string(), "test".to_string())],
///     )
///     .per_page(2);
///
/// while let Some(page) = pages.next_page().await {
///     let envelope = page?;
///     println!("page with status {}", envelope.status_code);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PageIterator<'a> {
    executor: &'a HttpExecutor,
    method: Method,
    url: String,
    params: Vec<(String, String)>,
    resource_name: Option<String>,
    exhausted: bool,
}

impl<'a> PageIterator<'a> {
    /// Builds an iterator for the given initial request.
    ///
    /// No network call happens until the first [`PageIterator::next_page`].
    pub fn new(
        executor: &'a HttpExecutor,
        method: Method,
        url: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Self {
        Self {
            executor,
            method,
            url: url.into(),
            params,
            resource_name: None,
            exhausted: false,
        }
    }

    /// Attaches a resource name echoed onto every envelope.
    pub fn with_resource_name(mut self, resource_name: impl Into<String>) -> Self {
        self.resource_name = Some(resource_name.into());
        self
    }

    /// Sets the `perPage` query parameter.
    pub fn per_page(mut self, count: u32) -> Self {
        self.set_param(PER_PAGE_PARAM, &count.to_string());
        self
    }

    /// Fetches the next page.
    ///
    /// Returns `None` once the sequence is exhausted: after a page without
    /// a continuation token, or after an error (which is yielded once and
    /// then ends the sequence).
    pub async fn next_page(&mut self) -> Option<Result<ResponseEnvelope>> {
        if self.exhausted {
            return None;
        }

        let options = RequestOptions {
            params: Some(self.params.clone()),
            resource_name: self.resource_name.clone(),
            ..Default::default()
        };
        match self
            .executor
            .request(self.method.clone(), &self.url, options)
            .await
        {
            Ok(envelope) => {
                match continuation_token(&envelope) {
                    Some(token) => self.set_param(CONTINUE_PARAM, &token),
                    None => self.exhausted = true,
                }
                Some(Ok(envelope))
            }
            Err(err) => {
                self.exhausted = true;
                Some(Err(err))
            }
        }
    }

    /// Adapts the iterator into a [`Stream`] of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<ResponseEnvelope>> + 'a {
        stream::unfold(self, |mut pages| async move {
            pages.next_page().await.map(|item| (item, pages))
        })
    }

    /// Sets or replaces a query parameter in place.
    fn set_param(&mut self, key: &str, value: &str) {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.params.push((key.to_string(), value.to_string())),
        }
    }
}

/// Extracts the continuation token from a page body.
///
/// The token lives at `meta.continue`. Servers return either an opaque
/// token or a URL/query-shaped value whose own `continue` parameter holds
/// the token; both forms are handled. An absent or empty value means the
/// page is the last one.
fn continuation_token(envelope: &ResponseEnvelope) -> Option<String> {
    let value = envelope
        .data
        .as_json()?
        .get("meta")?
        .get(CONTINUE_PARAM)?
        .as_str()?;
    if value.is_empty() {
        return None;
    }
    Some(extract_continue_param(value).unwrap_or_else(|| value.to_string()))
}

/// Pulls the `continue` parameter out of a URL- or query-shaped value.
fn extract_continue_param(value: &str) -> Option<String> {
    let (_, query) = value.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == CONTINUE_PARAM)
        .map(|(_, v)| v.into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
