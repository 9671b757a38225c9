//! Retry/backoff orchestration
//!
//! [`run_with_backoff`] wraps an async operation and retries it on
//! transient failures, using the error classification from
//! [`MetaregError::is_retryable`]: connection failures, timeouts, redirect
//! loops and HTTP errors are retried, except HTTP 400-499 (other than 429)
//! which is fatal. Retry timing comes from a pluggable [`WaitGenerator`];
//! a constant delay is the default and exponential backoff is available.
//!
//! Every retry logs a `tracing` warning with the attempt number and the
//! call target, and invokes the optional `on_backoff` callback. Retries of
//! one logical call are strictly sequential; there is no overall deadline
//! across attempts.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

use crate::error::{MetaregError, Result};

// ---------------------------------------------------------------------------
// WaitGenerator
// ---------------------------------------------------------------------------

/// Produces the delay before a given retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitGenerator {
    /// The same delay before every retry.
    Constant {
        /// Delay between attempts.
        interval: Duration,
    },
    /// `base * factor^(attempt - 1)`, capped at `max`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Multiplier applied per attempt.
        factor: f64,
        /// Upper bound on the produced delay.
        max: Duration,
    },
}

impl WaitGenerator {
    /// Delay before the retry following the `attempt`-th failure
    /// (1-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            WaitGenerator::Constant { interval } => interval,
            WaitGenerator::Exponential { base, factor, max } => {
                let exponent = attempt.saturating_sub(1).min(64);
                let scaled = base.as_secs_f64() * factor.powi(exponent as i32);
                Duration::from_secs_f64(scaled.min(max.as_secs_f64()))
            }
        }
    }
}

impl Default for WaitGenerator {
    fn default() -> Self {
        WaitGenerator::Constant {
            interval: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// BackoffSpec
// ---------------------------------------------------------------------------

/// Callback invoked on every retry with the attempt number and the call
/// target (method and URL).
pub type OnBackoff = Arc<dyn Fn(u32, &str) + Send + Sync>;

/// Retry policy for one logical call.
///
/// Cloned at the start of every [`run_with_backoff`] invocation, so a spec
/// can be reused across calls without one run observing another's state.
#[derive(Clone)]
pub struct BackoffSpec {
    /// Total number of attempts, including the first. Values below 1 are
    /// treated as 1.
    pub max_tries: u32,
    /// Delay schedule between attempts.
    pub wait: WaitGenerator,
    /// Optional diagnostic hook invoked on every retry.
    pub on_backoff: Option<OnBackoff>,
}

impl BackoffSpec {
    /// Constant-delay policy.
    pub fn constant(interval: Duration) -> Self {
        Self {
            wait: WaitGenerator::Constant { interval },
            ..Default::default()
        }
    }

    /// Exponential policy: `base * factor^(attempt - 1)` capped at `max`.
    pub fn exponential(base: Duration, factor: f64, max: Duration) -> Self {
        Self {
            wait: WaitGenerator::Exponential { base, factor, max },
            ..Default::default()
        }
    }

    /// Sets the total attempt budget.
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Installs a retry callback.
    pub fn with_on_backoff(mut self, hook: OnBackoff) -> Self {
        self.on_backoff = Some(hook);
        self
    }
}

impl Default for BackoffSpec {
    fn default() -> Self {
        Self {
            max_tries: 10,
            wait: WaitGenerator::default(),
            on_backoff: None,
        }
    }
}

impl fmt::Debug for BackoffSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffSpec")
            .field("max_tries", &self.max_tries)
            .field("wait", &self.wait)
            .field("on_backoff", &self.on_backoff.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// run_with_backoff
// ---------------------------------------------------------------------------

/// Executes `operation`, retrying transient failures per `spec`.
///
/// `target` identifies the call in diagnostics, typically `"GET <url>"`.
/// The operation is re-invoked for every attempt; attempts never overlap.
/// When the error is fatal or the attempt budget is spent, the original
/// typed error is returned unchanged.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use metareg::backoff::{run_with_backoff, BackoffSpec};
///
/// # async fn example() -> metareg::Result<()> {
/// let spec = BackoffSpec::constant(Duration::from_millis(50)).with_max_tries(3);
/// let value = run_with_backoff(&spec, "GET http://example.com", || async {
///     Ok::<_, metareg::MetaregError>(42)
/// })
/// .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn run_with_backoff<T, F, Fut>(spec: &BackoffSpec, target: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    // Each run works on its own copy of the policy.
    let spec = spec.clone();
    let max_tries = spec.max_tries.max(1);
    let mut tries = 0u32;

    loop {
        tries += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || tries >= max_tries {
            return Err(err);
        }

        warn!(tries, call = target, error = %err, "retrying after transient failure");
        if let Some(hook) = &spec.on_backoff {
            hook(tries, target);
        }
        sleep(spec.wait.delay(tries)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
