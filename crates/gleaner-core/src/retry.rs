use std::future::Future;
use std::time::Duration;

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Terminal,
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// A terminal failure, surfaced immediately without consuming a retry.
    #[error("{0}")]
    Terminal(#[source] E),
    /// The last error after the retry budget ran out.
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    #[must_use]
    pub fn into_inner(self) -> E {
        match self {
            Self::Terminal(e) | Self::Exhausted { source: e, .. } => e,
        }
    }
}

/// Bounded retry with exponential backoff.
///
/// `max_retries` counts additional attempts beyond the first, so an operation
/// runs at most `max_retries + 1` times. The delay doubles per attempt from
/// `base_delay`, with up to 25% random jitter added on top.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Policy without delays, for deterministic tests.
    #[must_use]
    pub const fn no_delay(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        if doubled.is_zero() {
            return doubled;
        }
        let jitter = doubled.mul_f64(rand::random::<f64>() * 0.25);
        doubled + jitter
    }

    /// Run `operation`, retrying failures that `classify` marks retryable.
    pub async fn execute<T, E, Op, Fut, C>(
        &self,
        mut operation: Op,
        classify: C,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if classify(&err) == ErrorClass::Terminal {
                        return Err(RetryError::Terminal(err));
                    }
                    if attempt >= self.max_retries {
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            source: err,
                        });
                    }

                    let delay = self.backoff(attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
