//! Batch orchestration
//!
//! Drives the document processor over N documents, all sharing one global
//! concurrency limiter and one result cache, then synthesizes the final
//! [`BatchReport`]. The batch always runs to completion: individual page and
//! document failures are carried in verdicts, never thrown.

use crate::document::DocumentProcessor;
use crate::executor::UnitExecutor;
use crate::limiter::ConcurrencyLimiter;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::provider::{AnalysisProvider, DocumentRasterizer};
use crate::types::{AnalysisResult, BatchId, BatchReport, EngineConfig};
use futures::future::join_all;
use pageproof_cache::AnalysisCache;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Orchestrates one batch validation run
pub struct BatchOrchestrator<P, R> {
    config: EngineConfig,
    rasterizer: Arc<R>,
    processor: DocumentProcessor<P, R>,
    progress: Arc<ProgressTracker>,
    limiter: Arc<ConcurrencyLimiter>,
}

impl<P, R> BatchOrchestrator<P, R>
where
    P: AnalysisProvider + 'static,
    R: DocumentRasterizer,
{
    /// Create an orchestrator wired from configuration
    #[must_use]
    pub fn new(config: EngineConfig, provider: Arc<P>, rasterizer: Arc<R>) -> Self {
        let cache: Option<AnalysisCache<AnalysisResult>> = if config.cache_enabled {
            Some(match &config.cache_dir {
                Some(dir) => AnalysisCache::persistent(config.memory_cache_capacity, dir),
                None => AnalysisCache::in_memory(config.memory_cache_capacity),
            })
        } else {
            None
        };

        let limiter = Arc::new(ConcurrencyLimiter::new(config.concurrency));
        let progress = Arc::new(ProgressTracker::new());
        let executor = Arc::new(UnitExecutor::new(
            provider,
            cache,
            config.prompt.clone(),
            config.page_timeout(),
        ));
        let processor = DocumentProcessor::new(
            Arc::clone(&rasterizer),
            executor,
            Arc::clone(&limiter),
            Arc::clone(&progress),
            config.pass_threshold,
        );

        Self {
            config,
            rasterizer,
            processor,
            progress,
            limiter,
        }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current progress counters
    #[inline]
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Run the batch over the given documents
    ///
    /// Documents are processed concurrently, but provider concurrency is
    /// still bounded globally by the one shared limiter.
    pub async fn run(&self, documents: &[PathBuf]) -> BatchReport {
        let batch_id = BatchId::new();
        let started_at = chrono::Utc::now();
        let started = Instant::now();
        tracing::info!(
            batch = %batch_id,
            documents = documents.len(),
            concurrency = self.limiter.limit(),
            cache_enabled = self.config.cache_enabled,
            "starting batch"
        );

        self.progress.set_total(self.count_pages(documents).await);

        let verdicts = join_all(documents.iter().map(|doc| self.processor.process(doc))).await;

        let snapshot = self.progress.snapshot();
        let total_pages: u64 = verdicts.iter().map(|v| u64::from(v.total_pages)).sum();
        let failed_pages: u64 = verdicts.iter().map(|v| u64::from(v.failed_pages)).sum();
        let cached_pages = snapshot.cached;
        // Provider-analyzed successes: everything finished that neither
        // failed nor came from cache.
        let analyzed_pages = snapshot
            .completed
            .saturating_sub(snapshot.failed)
            .saturating_sub(cached_pages);

        let scored: Vec<f64> = verdicts
            .iter()
            .filter(|v| v.successful_pages > 0)
            .map(|v| v.aggregate_score)
            .collect();
        let average_score = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        let looked_up = cached_pages + analyzed_pages;
        let cache_hit_rate = if looked_up > 0 {
            cached_pages as f64 / looked_up as f64 * 100.0
        } else {
            0.0
        };

        let report = BatchReport {
            batch_id,
            started_at,
            documents: verdicts,
            total_pages,
            cached_pages,
            analyzed_pages,
            failed_pages,
            average_score,
            wall_clock_ms: started.elapsed().as_millis() as u64,
            cache_hit_rate,
        };

        self.progress.complete("batch");
        tracing::info!(
            batch = %batch_id,
            passed = report.passed(),
            average_score = report.average_score,
            cache_hit_rate = report.cache_hit_rate,
            wall_clock_ms = report.wall_clock_ms,
            "batch finished"
        );
        report
    }

    /// Cheap pre-pass so the progress denominator is accurate
    ///
    /// A document that cannot be inspected is estimated at one page rather
    /// than aborting the batch.
    async fn count_pages(&self, documents: &[PathBuf]) -> u64 {
        let mut total = 0u64;
        for doc in documents {
            match self.rasterizer.page_count(doc).await {
                Ok(pages) => total += u64::from(pages),
                Err(e) => {
                    tracing::warn!(document = %doc.display(), error = %e, "page count failed, estimating 1");
                    total += 1;
                }
            }
        }
        total
    }
}
