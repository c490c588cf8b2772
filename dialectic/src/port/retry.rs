//! Retry with exponential backoff, as a port decorator.
//!
//! The orchestrator never retries on its own; wrap the port in
//! [`RetryingPort`] to opt in. Only [`GenerationError::is_retriable`]
//! failures are re-issued.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::TextGenerationPort;
use crate::config::GenerationProfile;
use crate::error::GenerationError;

/// Backoff schedule for [`RetryingPort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, doubled each time.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Cap on any single delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Port decorator that re-issues retriable failures.
pub struct RetryingPort<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P> RetryingPort<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: TextGenerationPort> TextGenerationPort for RetryingPort<P> {
    async fn generate(
        &self,
        prompt: &str,
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(prompt, profile).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retriable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Fails `failures` times with the given error, then answers.
    struct FlakyPort {
        failures: u32,
        error: GenerationError,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerationPort for FlakyPort {
        async fn generate(
            &self,
            _prompt: &str,
            _profile: &GenerationProfile,
        ) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
        assert_eq!(policy.delay_for(40), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let port = RetryingPort::new(
            FlakyPort {
                failures: 2,
                error: GenerationError::Backend("503".into()),
                calls: AtomicU32::new(0),
            },
            fast_policy(2),
        );
        let out = port
            .generate("p", &GenerationProfile::deterministic())
            .await
            .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(port.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(port.policy().max_retries, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let port = RetryingPort::new(
            FlakyPort {
                failures: 5,
                error: GenerationError::RateLimited("429".into()),
                calls: AtomicU32::new(0),
            },
            fast_policy(1),
        );
        let err = port
            .generate("p", &GenerationProfile::deterministic())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited(_)));
        assert_eq!(port.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_is_not_retried() {
        let port = RetryingPort::new(
            FlakyPort {
                failures: 1,
                error: GenerationError::Cancelled,
                calls: AtomicU32::new(0),
            },
            fast_policy(3),
        );
        assert!(port
            .generate("p", &GenerationProfile::deterministic())
            .await
            .is_err());
        assert_eq!(port.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_serde_uses_millis() {
        let json = serde_json::to_value(RetryPolicy::default()).unwrap();
        assert_eq!(json["initial_delay"], 500);
        assert_eq!(json["max_delay"], 8000);
        let parsed: RetryPolicy = serde_json::from_str(r#"{"max_retries": 4}"#).unwrap();
        assert_eq!(parsed.max_retries, 4);
        assert_eq!(parsed.initial_delay, Duration::from_millis(500));
    }
}
