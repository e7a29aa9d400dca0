//! Isolated unit executor
//!
//! Runs one page's analysis in a failure-contained, timeout-bound context.
//! `execute` always resolves: any internal failure is converted into a
//! failed [`PageResult`] instead of propagating. One `execute` call makes at
//! most one provider invocation; retry, if wanted, is the caller's decision.

use crate::error::FailureKind;
use crate::provider::AnalysisProvider;
use crate::types::{AnalysisResult, PageOutcome, PageResult, PromptContext, WorkUnit};
use pageproof_cache::{AnalysisCache, Fingerprint};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Executes one work unit: fingerprint, cache lookup, provider call under a
/// hard deadline, cache store
///
/// Throttling is not this component's job; callers gate `execute` through
/// the [`crate::limiter::ConcurrencyLimiter`].
pub struct UnitExecutor<P> {
    provider: Arc<P>,
    cache: Option<AnalysisCache<AnalysisResult>>,
    prompt: PromptContext,
    timeout: Duration,
}

impl<P: AnalysisProvider> UnitExecutor<P> {
    /// Create a new executor
    #[inline]
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        cache: Option<AnalysisCache<AnalysisResult>>,
        prompt: PromptContext,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            prompt,
            timeout,
        }
    }

    /// Execute one work unit, always resolving to a [`PageResult`]
    pub async fn execute(&self, unit: &WorkUnit) -> PageResult {
        let started = Instant::now();
        let label = unit.label();

        let bytes = match unit.content.load().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(unit = %label, error = %e, "page content unavailable");
                return PageResult {
                    page_number: unit.page_number,
                    outcome: PageOutcome::Failure {
                        kind: FailureKind::Provider,
                        message: format!("page content unavailable: {e}"),
                    },
                    from_cache: false,
                    duration: started.elapsed(),
                };
            }
        };

        let fingerprint = Fingerprint::compute(&bytes, &self.provider.method_version());

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.lookup(&fingerprint).await {
                tracing::debug!(unit = %label, fingerprint = %fingerprint.short(), "cache hit");
                return PageResult {
                    page_number: unit.page_number,
                    outcome: PageOutcome::Success {
                        score: entry.result.score,
                        violations: entry.result.violations.clone(),
                    },
                    from_cache: true,
                    duration: started.elapsed(),
                };
            }
        }

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.provider.analyze(&bytes, &self.prompt),
        )
        .await
        {
            Ok(Ok(result)) => {
                if let Some(cache) = &self.cache {
                    cache.store(fingerprint, result.clone()).await;
                }
                tracing::debug!(unit = %label, score = result.score, "analysis complete");
                PageOutcome::Success {
                    score: result.score,
                    violations: result.violations,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(unit = %label, error = %e, "analysis failed");
                PageOutcome::Failure {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!(unit = %label, timeout_ms = self.timeout.as_millis() as u64, "analysis timed out");
                PageOutcome::Failure {
                    kind: FailureKind::Timeout,
                    message: format!(
                        "analysis exceeded the {}ms per-page deadline",
                        self.timeout.as_millis()
                    ),
                }
            }
        };

        PageResult {
            page_number: unit.page_number,
            outcome,
            from_cache: false,
            duration: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::types::{ContentRef, DocumentId};
    use pageproof_cache::MethodVersion;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        score: f64,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AnalysisProvider for FixedProvider {
        fn method_version(&self) -> MethodVersion {
            MethodVersion::new("fixed", "v1")
        }

        async fn analyze(
            &self,
            _content: &[u8],
            _prompt: &PromptContext,
        ) -> Result<AnalysisResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AnalysisResult::with_score(self.score))
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl AnalysisProvider for FailingProvider {
        fn method_version(&self) -> MethodVersion {
            MethodVersion::new("failing", "v1")
        }

        async fn analyze(
            &self,
            _content: &[u8],
            _prompt: &PromptContext,
        ) -> Result<AnalysisResult, ProviderError> {
            Err(ProviderError::Provider("503 from upstream".to_string()))
        }
    }

    struct HangingProvider;

    #[async_trait::async_trait]
    impl AnalysisProvider for HangingProvider {
        fn method_version(&self) -> MethodVersion {
            MethodVersion::new("hanging", "v1")
        }

        async fn analyze(
            &self,
            _content: &[u8],
            _prompt: &PromptContext,
        ) -> Result<AnalysisResult, ProviderError> {
            std::future::pending().await
        }
    }

    fn unit(content: &[u8]) -> WorkUnit {
        WorkUnit::new(
            DocumentId::new("doc"),
            1,
            ContentRef::from_bytes(content.to_vec()),
        )
    }

    fn executor<P: AnalysisProvider>(
        provider: P,
        cache: Option<AnalysisCache<AnalysisResult>>,
        timeout: Duration,
    ) -> UnitExecutor<P> {
        UnitExecutor::new(Arc::new(provider), cache, PromptContext::default(), timeout)
    }

    #[tokio::test]
    async fn first_execute_misses_second_hits_cache() {
        let provider = FixedProvider {
            score: 9.0,
            calls: AtomicUsize::new(0),
        };
        let exec = executor(
            provider,
            Some(AnalysisCache::in_memory(100)),
            Duration::from_secs(5),
        );

        let first = exec.execute(&unit(b"page")).await;
        assert!(first.is_success());
        assert!(!first.from_cache);

        let second = exec.execute(&unit(b"page")).await;
        assert!(second.is_success());
        assert!(second.from_cache);
        assert_eq!(second.score(), Some(9.0));
        assert_eq!(exec.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_content_misses_separately() {
        let provider = FixedProvider {
            score: 8.0,
            calls: AtomicUsize::new(0),
        };
        let exec = executor(
            provider,
            Some(AnalysisCache::in_memory(100)),
            Duration::from_secs(5),
        );

        exec.execute(&unit(b"page one")).await;
        exec.execute(&unit(b"page two")).await;
        assert_eq!(exec.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_invokes_provider() {
        let provider = FixedProvider {
            score: 8.0,
            calls: AtomicUsize::new(0),
        };
        let exec = executor(provider, None, Duration::from_secs(5));

        exec.execute(&unit(b"page")).await;
        let second = exec.execute(&unit(b"page")).await;
        assert!(!second.from_cache);
        assert_eq!(exec.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn provider_error_becomes_failure_result() {
        let exec = executor(FailingProvider, None, Duration::from_secs(5));

        let result = exec.execute(&unit(b"page")).await;
        match result.outcome {
            PageOutcome::Failure { kind, ref message } => {
                assert_eq!(kind, FailureKind::Provider);
                assert!(message.contains("503"));
            }
            PageOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn hang_is_cut_off_by_timeout() {
        let exec = executor(HangingProvider, None, Duration::from_millis(50));

        let started = Instant::now();
        let result = exec.execute(&unit(b"page")).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        match result.outcome {
            PageOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::Timeout),
            PageOutcome::Success { .. } => panic!("expected timeout failure"),
        }
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = AnalysisCache::in_memory(100);
        let exec = executor(FailingProvider, Some(cache.clone()), Duration::from_secs(5));

        exec.execute(&unit(b"page")).await;
        let stats = cache.stats().await;
        assert_eq!(stats.memory_entries, 0);
    }

    #[tokio::test]
    async fn unreadable_content_is_contained() {
        let exec = executor(
            FixedProvider {
                score: 9.0,
                calls: AtomicUsize::new(0),
            },
            None,
            Duration::from_secs(5),
        );

        let unit = WorkUnit::new(
            DocumentId::new("doc"),
            1,
            ContentRef::Path("/nonexistent/page-1.png".into()),
        );
        let result = exec.execute(&unit).await;
        assert!(!result.is_success());
        assert_eq!(exec.provider.calls.load(Ordering::SeqCst), 0);
    }
}
