//! PageProof Engine - Batch validation orchestration
//!
//! Takes many multi-page documents, submits each page to an expensive
//! external analysis, and does so:
//! - under one global concurrency bound
//! - with content-addressed result caching (unchanged input is never
//!   re-analyzed)
//! - with per-page timeout and failure isolation (one bad page never stalls
//!   or crashes the batch)
//! - aggregating page results into document verdicts and a batch report
//!
//! # Example
//!
//! ```rust,ignore
//! use pageproof_engine::{BatchOrchestrator, EngineConfig};
//! use std::sync::Arc;
//!
//! # async fn example(provider: Arc<MyProvider>, rasterizer: Arc<MyRasterizer>) {
//! let config = EngineConfig::new()
//!     .with_concurrency(4)
//!     .with_cache_dir(".pageproof-cache");
//! let orchestrator = BatchOrchestrator::new(config, provider, rasterizer);
//!
//! let report = orchestrator.run(&["brief.pdf".into()]).await;
//! std::process::exit(if report.passed() { 0 } else { 1 });
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod batch;
pub mod document;
pub mod error;
pub mod executor;
pub mod limiter;
pub mod progress;
pub mod provider;
pub mod types;

pub use batch::BatchOrchestrator;
pub use document::{fold_verdict, DocumentProcessor};
pub use error::{FailureKind, ProviderError, RasterizeError};
pub use executor::UnitExecutor;
pub use limiter::ConcurrencyLimiter;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use provider::{AnalysisProvider, DocumentRasterizer};
pub use types::{
    AnalysisResult, BatchId, BatchReport, ContentRef, DocumentId, DocumentVerdict, EngineConfig,
    Grade, PageOutcome, PageResult, PromptContext, RasterPage, Severity, Violation, WorkUnit,
};

// Re-export the cache types callers need to reason about keys.
pub use pageproof_cache::{AnalysisCache, Fingerprint, MethodVersion};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the engine
    pub use crate::{
        AnalysisProvider, AnalysisResult, BatchOrchestrator, BatchReport, DocumentRasterizer,
        DocumentVerdict, EngineConfig, MethodVersion, PromptContext, RasterPage, Severity,
        Violation,
    };
}
