//! Validator configuration.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Per-validator configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidatorConfig {
    /// Maximum rule evaluations running at once across the validator
    /// (None = unlimited).
    /// Useful when rules call out to a rate-limited service.
    pub max_concurrent_rules: Option<usize>,
}

impl ValidatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound concurrent rule evaluations. A limit of 0 is treated as 1.
    pub fn max_concurrent_rules(mut self, max: usize) -> Self {
        self.max_concurrent_rules = Some(max.max(1));
        self
    }

    /// Remove any bound on concurrent rule evaluations.
    pub fn unbounded(mut self) -> Self {
        self.max_concurrent_rules = None;
        self
    }

    pub(crate) fn limiter(&self) -> Option<RuleLimiter> {
        self.max_concurrent_rules.map(RuleLimiter::new)
    }
}

/// Limits the number of concurrent rule evaluations.
#[derive(Clone)]
pub(crate) struct RuleLimiter {
    semaphore: Arc<Semaphore>,
}

impl RuleLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Acquires a permit, waiting if necessary.
    ///
    /// The permit is released when dropped. Returns `None` only if the
    /// semaphore was closed, which this type never does.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).acquire_owned().await.ok()
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unbounded() {
        assert!(ValidatorConfig::default().limiter().is_none());
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let config = ValidatorConfig::new().max_concurrent_rules(0);
        assert_eq!(config.max_concurrent_rules, Some(1));
        assert!(config.unbounded().max_concurrent_rules.is_none());
    }

    #[tokio::test]
    async fn test_permits_are_released_on_drop() {
        let limiter = ValidatorConfig::new().max_concurrent_rules(2).limiter().unwrap();
        let first = limiter.acquire().await;
        assert!(first.is_some());
        assert_eq!(limiter.available(), 1);
        drop(first);
        assert_eq!(limiter.available(), 2);
    }
}
