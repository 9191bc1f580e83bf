//! Retrying backend wrapper: per-call timeout plus bounded exponential
//! backoff on transient failures.
//!
//! Non-transient errors (authentication, 4xx) are returned on first sight.

use async_trait::async_trait;
use dossier_core::error::BackendError;
use dossier_core::{GenerationBackend, Prompt, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct RetryingBackend {
    inner: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn GenerationBackend>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// How long to wait before `retry`, honoring a rate limiter's hint.
    fn backoff(&self, retry: u32, error: &BackendError) -> Duration {
        let delay = self.policy.delay_for(retry);
        match error {
            BackendError::RateLimited { retry_after_secs } => {
                delay.max(Duration::from_secs(*retry_after_secs).min(self.policy.max_delay))
            }
            _ => delay,
        }
    }
}

#[async_trait]
impl GenerationBackend for RetryingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        target_token_budget: u32,
    ) -> std::result::Result<String, BackendError> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            let result =
                match tokio::time::timeout(self.timeout, self.inner.generate(prompt, target_token_budget))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::Timeout(format!(
                        "Backend '{}' timed out after {}s",
                        self.inner.name(),
                        self.timeout.as_secs()
                    ))),
                };

            let error = match result {
                Ok(text) => {
                    if attempt > 1 {
                        info!(backend = %self.inner.name(), attempt, "Backend call succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= attempts {
                warn!(
                    backend = %self.inner.name(),
                    attempt,
                    error = %error,
                    "Backend call failed, giving up"
                );
                return Err(error);
            }

            let delay = self.backoff(attempt, &error);
            warn!(
                backend = %self.inner.name(),
                attempt,
                total = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient backend error, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails with the scripted errors in order, then succeeds.
    struct FlakyBackend {
        errors: Mutex<Vec<BackendError>>,
        call_count: Mutex<usize>,
    }

    impl FlakyBackend {
        fn new(errors: Vec<BackendError>) -> Self {
            Self {
                errors: Mutex::new(errors),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl GenerationBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(
            &self,
            _prompt: &Prompt,
            _target_token_budget: u32,
        ) -> std::result::Result<String, BackendError> {
            *self.call_count.lock().unwrap() += 1;
            let mut errors = self.errors.lock().unwrap();
            if errors.is_empty() {
                Ok("success".into())
            } else {
                Err(errors.remove(0))
            }
        }
    }

    /// Never answers (for timeout testing).
    struct HangingBackend;

    #[async_trait]
    impl GenerationBackend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(
            &self,
            _prompt: &Prompt,
            _target_token_budget: u32,
        ) -> std::result::Result<String, BackendError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_secs(1), Duration::from_secs(8))
    }

    fn prompt() -> Prompt {
        Prompt::new("", "hello")
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let inner = Arc::new(FlakyBackend::new(vec![
            BackendError::ApiError {
                status_code: 502,
                message: "bad gateway".into(),
            },
            BackendError::Network("reset".into()),
        ]));
        let backend = RetryingBackend::new(inner.clone(), policy(3), Duration::from_secs(30));

        assert_eq!(backend.generate(&prompt(), 100).await.unwrap(), "success");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_errors_are_not_retried() {
        let inner = Arc::new(FlakyBackend::new(vec![BackendError::AuthenticationFailed(
            "bad key".into(),
        )]));
        let backend = RetryingBackend::new(inner.clone(), policy(3), Duration::from_secs(30));

        let err = backend.generate(&prompt(), 100).await.unwrap_err();
        assert!(matches!(err, BackendError::AuthenticationFailed(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let inner = Arc::new(FlakyBackend::new(
            (0..10)
                .map(|_| BackendError::RateLimited { retry_after_secs: 1 })
                .collect(),
        ));
        let backend = RetryingBackend::new(inner.clone(), policy(2), Duration::from_secs(30));

        let err = backend.generate(&prompt(), 100).await.unwrap_err();
        assert!(matches!(err, BackendError::RateLimited { .. }));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_transient_and_reported() {
        let backend = RetryingBackend::new(
            Arc::new(HangingBackend),
            policy(1),
            Duration::from_millis(50),
        );
        let err = backend.generate(&prompt(), 100).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(_)));
    }

    #[test]
    fn rate_limit_hint_extends_backoff() {
        let backend = RetryingBackend::new(
            Arc::new(HangingBackend),
            policy(3).with_jitter(Duration::ZERO),
            Duration::from_secs(1),
        );
        let hinted = backend.backoff(1, &BackendError::RateLimited { retry_after_secs: 6 });
        assert_eq!(hinted, Duration::from_secs(6));
        let plain = backend.backoff(1, &BackendError::Network("x".into()));
        assert_eq!(plain, Duration::from_secs(1));
    }
}
