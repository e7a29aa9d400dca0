//! Collaborator traits consumed by the engine
//!
//! The actual analysis heuristics and rasterization live outside this crate;
//! the engine only depends on these seams. Implementations must be cheap to
//! share behind an `Arc`.

use crate::error::{ProviderError, RasterizeError};
use crate::types::{AnalysisResult, PromptContext, RasterPage};
use pageproof_cache::MethodVersion;
use std::path::Path;

/// External page analysis provider
///
/// Latency is expected to be multi-second and per-call cost non-trivial;
/// this is precisely why the engine caches results and bounds concurrency.
#[async_trait::async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Identity of this provider and its prompt revision
    ///
    /// Folded into every fingerprint, so changing it invalidates all prior
    /// cache entries.
    fn method_version(&self) -> MethodVersion;

    /// Analyze one rasterized page
    ///
    /// # Errors
    /// Returns a typed error; the executor converts it into a failed
    /// [`crate::types::PageResult`] rather than letting it propagate.
    async fn analyze(
        &self,
        content: &[u8],
        prompt: &PromptContext,
    ) -> Result<AnalysisResult, ProviderError>;
}

/// Document-to-pages rasterizer
#[async_trait::async_trait]
pub trait DocumentRasterizer: Send + Sync {
    /// Cheap page count for progress accounting
    ///
    /// # Errors
    /// Returns error if the document cannot be inspected; the orchestrator
    /// logs the failure and estimates one page.
    async fn page_count(&self, document: &Path) -> Result<u32, RasterizeError>;

    /// Decompose a document into pages, in increasing page-number order
    ///
    /// # Errors
    /// Returns error if the document cannot be decomposed at all
    async fn rasterize(&self, document: &Path) -> Result<Vec<RasterPage>, RasterizeError>;
}
