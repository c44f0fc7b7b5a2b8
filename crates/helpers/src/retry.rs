//! Re-running fallible async operations with randomized delays.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

/// Options for [`retry`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// How often a failed operation is retried before its error is returned.
    pub max_retries: usize,
    /// The upper bound for the delay before each retry.
    ///
    /// The delay is drawn uniformly from `[0, timeout_multiplier)`. Retries happen immediately
    /// if this is zero.
    #[serde(with = "humantime_serde")]
    pub timeout_multiplier: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            timeout_multiplier: Duration::from_secs(1),
        }
    }
}

type ErrorHandler<E> = Box<dyn FnMut(&E, usize) + Send>;

/// A retrying operation, created by [`retry`].
pub struct Retry<Op, E> {
    operation: Op,
    on_err: Option<ErrorHandler<E>>,
    config: RetryConfig,
}

/// Wraps `operation` so that failures are retried.
///
/// The operation is re-created by calling `operation` again for every attempt. After the first
/// failure it is retried up to [`max_retries`](RetryConfig::max_retries) times, sleeping for a
/// random duration below [`timeout_multiplier`](RetryConfig::timeout_multiplier) in between. If
/// all attempts fail, the error of the last one is returned as is.
///
/// ```
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// use std::time::Duration;
///
/// let mut attempts = 0;
/// let result = helpers::retry(|| {
///     attempts += 1;
///     let attempt = attempts;
///     async move { if attempt < 3 { Err("not yet") } else { Ok(attempt) } }
/// })
/// .timeout_multiplier(Duration::ZERO)
/// .run()
/// .await;
///
/// assert_eq!(result, Ok(3));
/// # });
/// ```
pub fn retry<Op, Fut, T, E>(operation: Op) -> Retry<Op, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    Retry {
        operation,
        on_err: None,
        config: RetryConfig::default(),
    }
}

impl<Op, Fut, T, E> Retry<Op, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    /// Calls `on_err` with every error and the number of retries done so far.
    ///
    /// This is also called for the final error, before it is returned.
    pub fn on_err(mut self, on_err: impl FnMut(&E, usize) + Send + 'static) -> Self {
        self.on_err = Some(Box::new(on_err));
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn timeout_multiplier(mut self, timeout_multiplier: Duration) -> Self {
        self.config.timeout_multiplier = timeout_multiplier;
        self
    }

    /// Replaces all options with `config`.
    pub fn with_config(mut self, config: &RetryConfig) -> Self {
        self.config = *config;
        self
    }

    /// Runs the operation until it succeeds or the retries are exhausted.
    ///
    /// Every call starts over with no retries done.
    pub async fn run(&mut self) -> Result<T, E> {
        let mut retries = 0;
        loop {
            metric!(counter("retry.attempt") += 1);
            let error = match (self.operation)().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if let Some(on_err) = self.on_err.as_mut() {
                on_err(&error, retries);
            }

            if retries >= self.config.max_retries {
                tracing::debug!(retries, "Giving up after exhausting retries");
                return Err(error);
            }
            retries += 1;

            let delay = self
                .config
                .timeout_multiplier
                .mul_f64(rand::random::<f64>());
            if !delay.is_zero() {
                tracing::debug!(retries, "Retrying in {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl<Op, E> fmt::Debug for Retry<Op, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("config", &self.config)
            .field("on_err", &self.on_err.is_some())
            .finish()
    }
}
