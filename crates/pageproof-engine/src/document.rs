//! Per-document processing
//!
//! Decomposes one document into work units, fans them out through the shared
//! limiter (one spawned task per page, so a panicking analysis is contained
//! by the task boundary), joins the results and folds them into a
//! [`DocumentVerdict`]. A single page's failure never fails the document;
//! a rasterization failure yields a zero-page failed verdict and the batch
//! moves on.

use crate::executor::UnitExecutor;
use crate::limiter::ConcurrencyLimiter;
use crate::progress::ProgressTracker;
use crate::provider::{AnalysisProvider, DocumentRasterizer};
use crate::types::{
    DocumentId, DocumentVerdict, Grade, PageOutcome, PageResult, Severity, WorkUnit,
};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Processes one document into a verdict
pub struct DocumentProcessor<P, R> {
    rasterizer: Arc<R>,
    executor: Arc<UnitExecutor<P>>,
    limiter: Arc<ConcurrencyLimiter>,
    progress: Arc<ProgressTracker>,
    pass_threshold: f64,
}

impl<P, R> DocumentProcessor<P, R>
where
    P: AnalysisProvider + 'static,
    R: DocumentRasterizer,
{
    /// Create a new document processor
    #[inline]
    #[must_use]
    pub fn new(
        rasterizer: Arc<R>,
        executor: Arc<UnitExecutor<P>>,
        limiter: Arc<ConcurrencyLimiter>,
        progress: Arc<ProgressTracker>,
        pass_threshold: f64,
    ) -> Self {
        Self {
            rasterizer,
            executor,
            limiter,
            progress,
            pass_threshold,
        }
    }

    /// Process one document end to end
    ///
    /// Always resolves to a verdict; processing failures are carried in the
    /// verdict, never thrown.
    pub async fn process(&self, document: &Path) -> DocumentVerdict {
        let document_id = DocumentId::from_path(document);
        tracing::info!(document = %document_id, "processing document");

        let pages = match self.rasterizer.rasterize(document).await {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(document = %document_id, error = %e, "rasterization failed");
                self.progress.fail(document_id.as_str());
                return DocumentVerdict::failed(document_id, e.to_string());
            }
        };

        let handles: Vec<_> = pages
            .into_iter()
            .map(|page| {
                let unit = WorkUnit::new(document_id.clone(), page.page_number, page.content);
                let executor = Arc::clone(&self.executor);
                let limiter = Arc::clone(&self.limiter);
                let progress = Arc::clone(&self.progress);
                let page_number = page.page_number;
                let handle = tokio::spawn(async move {
                    let label = unit.label();
                    let result = limiter.run(executor.execute(&unit)).await;
                    match result.outcome {
                        PageOutcome::Success { .. } => progress.update(&label, result.from_cache),
                        PageOutcome::Failure { .. } => progress.fail(&label),
                    }
                    result
                });
                (page_number, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        let (page_numbers, futures): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (page_number, joined) in page_numbers.into_iter().zip(join_all(futures).await) {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    // Task boundary contained a panic in the analysis path.
                    tracing::warn!(document = %document_id, page = page_number, error = %e, "analysis task aborted");
                    self.progress
                        .fail(&format!("{document_id} p{page_number}"));
                    results.push(PageResult {
                        page_number,
                        outcome: PageOutcome::Failure {
                            kind: crate::error::FailureKind::Provider,
                            message: format!("analysis task aborted: {e}"),
                        },
                        from_cache: false,
                        duration: Duration::ZERO,
                    });
                }
            }
        }

        let verdict = fold_verdict(document_id, results, self.pass_threshold);
        tracing::info!(
            document = %verdict.document_id,
            score = verdict.aggregate_score,
            grade = %verdict.grade,
            passed = verdict.passed,
            "document verdict"
        );
        verdict
    }
}

/// Fold page results into a document verdict
///
/// Pure and order-independent: results are sorted by page number before
/// aggregation, the mean covers successful pages only, and a document with
/// zero successful pages scores 0 and fails.
#[must_use]
pub fn fold_verdict(
    document_id: DocumentId,
    mut results: Vec<PageResult>,
    pass_threshold: f64,
) -> DocumentVerdict {
    results.sort_by_key(|r| r.page_number);

    let total_pages = results.len() as u32;
    let mut successful_pages = 0u32;
    let mut failed_pages = 0u32;
    let mut score_sum = 0.0;
    let mut violations = Vec::new();

    for result in &results {
        match &result.outcome {
            PageOutcome::Success {
                score,
                violations: page_violations,
            } => {
                successful_pages += 1;
                score_sum += score;
                violations.extend(page_violations.iter().cloned());
            }
            PageOutcome::Failure { .. } => failed_pages += 1,
        }
    }

    let aggregate_score = if successful_pages > 0 {
        score_sum / f64::from(successful_pages)
    } else {
        0.0
    };
    let has_critical = violations.iter().any(|v| v.severity == Severity::Critical);
    let passed = successful_pages > 0 && !has_critical && aggregate_score >= pass_threshold;

    DocumentVerdict {
        document_id,
        total_pages,
        successful_pages,
        failed_pages,
        aggregate_score,
        grade: Grade::from_score(aggregate_score),
        violations,
        passed,
        error: None,
    }
}
