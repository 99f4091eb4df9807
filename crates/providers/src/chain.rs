//! Generic ordered-fallback execution over a set of providers sharing one
//! input/output type.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("no provider available, attempts: {0:?}")]
    NoProviderAvailable(Vec<ChainAttempt>),
}

#[derive(Debug, Clone)]
pub struct ChainAttempt {
    pub provider: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChainOutcome<O> {
    pub result: O,
    pub provider_used: String,
    pub attempts: Vec<ChainAttempt>,
}

#[async_trait]
pub trait Provider<I, O>: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    async fn is_available(&self) -> bool;
    async fn execute(&self, input: &I) -> Result<O, String>;
}

pub struct FallbackChain<I, O> {
    providers: Vec<Arc<dyn Provider<I, O>>>,
    timeout: Duration,
}

impl<I, O> FallbackChain<I, O> {
    pub fn new(timeout: Duration) -> Self {
        Self { providers: Vec::new(), timeout }
    }

    pub fn register(&mut self, provider: Arc<dyn Provider<I, O>>) {
        self.providers.push(provider);
    }

    fn ordered(&self) -> Vec<&Arc<dyn Provider<I, O>>> {
        let mut ordered: Vec<&Arc<dyn Provider<I, O>>> = self.providers.iter().collect();
        ordered.sort_by_key(|p| p.priority());
        ordered
    }

    pub async fn execute(&self, input: &I) -> Result<ChainOutcome<O>, ChainError> {
        let mut attempts = Vec::new();

        for provider in self.ordered() {
            let available = match tokio::time::timeout(PROBE_TIMEOUT, provider.is_available()).await {
                Ok(ok) => ok,
                Err(_) => false,
            };
            if !available {
                tracing::debug!(provider = provider.name(), "skipping unavailable provider");
                continue;
            }

            match tokio::time::timeout(self.timeout, provider.execute(input)).await {
                Ok(Ok(result)) => {
                    attempts.push(ChainAttempt { provider: provider.name().to_string(), error: None });
                    return Ok(ChainOutcome { result, provider_used: provider.name().to_string(), attempts });
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider = provider.name(), error = %e, "provider attempt failed");
                    attempts.push(ChainAttempt { provider: provider.name().to_string(), error: Some(e) });
                }
                Err(_) => {
                    let msg = format!("timed out after {}ms", self.timeout.as_millis());
                    tracing::warn!(provider = provider.name(), "provider attempt timed out");
                    attempts.push(ChainAttempt { provider: provider.name().to_string(), error: Some(msg) });
                }
            }
        }

        Err(ChainError::NoProviderAvailable(attempts))
    }

    /// Availability of every registered provider, probed concurrently.
    pub async fn status(&self) -> Vec<(String, bool)> {
        let futs = self.providers.iter().map(|p| async move {
            let available = tokio::time::timeout(PROBE_TIMEOUT, p.is_available()).await.unwrap_or(false);
            (p.name().to_string(), available)
        });
        futures::future::join_all(futs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        name: &'static str,
        priority: i32,
        available: bool,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider<String, String> for StubProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        async fn is_available(&self) -> bool {
            self.available
        }
        async fn execute(&self, input: &String) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(format!("{}:{}", self.name, input))
            } else {
                Err(format!("{} failed", self.name))
            }
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_provider_on_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain: FallbackChain<String, String> = FallbackChain::new(Duration::from_secs(1));
        chain.register(Arc::new(StubProvider {
            name: "p1",
            priority: 0,
            available: true,
            succeed: false,
            calls: calls.clone(),
        }));
        chain.register(Arc::new(StubProvider {
            name: "p2",
            priority: 1,
            available: true,
            succeed: true,
            calls: calls.clone(),
        }));
        chain.register(Arc::new(StubProvider {
            name: "p3",
            priority: 2,
            available: true,
            succeed: true,
            calls: calls.clone(),
        }));

        let outcome = chain.execute(&"hi".to_string()).await.unwrap();
        assert_eq!(outcome.provider_used, "p2");
        assert_eq!(outcome.result, "p2:hi");
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2); // p3 never called
    }

    #[tokio::test]
    async fn unavailable_provider_is_skipped_without_executing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain: FallbackChain<String, String> = FallbackChain::new(Duration::from_secs(1));
        chain.register(Arc::new(StubProvider {
            name: "p1",
            priority: 0,
            available: false,
            succeed: true,
            calls: calls.clone(),
        }));
        chain.register(Arc::new(StubProvider {
            name: "p2",
            priority: 1,
            available: true,
            succeed: true,
            calls: calls.clone(),
        }));

        let outcome = chain.execute(&"x".to_string()).await.unwrap();
        assert_eq!(outcome.provider_used, "p2");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_returns_no_provider_available() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain: FallbackChain<String, String> = FallbackChain::new(Duration::from_secs(1));
        chain.register(Arc::new(StubProvider {
            name: "p1",
            priority: 0,
            available: true,
            succeed: false,
            calls: calls.clone(),
        }));

        let err = chain.execute(&"x".to_string()).await.unwrap_err();
        match err {
            ChainError::NoProviderAvailable(attempts) => assert_eq!(attempts.len(), 1),
        }
    }
}
