//! Testing utilities for the PageProof workspace
//!
//! Scripted analysis providers and rasterizers, plus a tracing bootstrap
//! for tests.

#![allow(missing_docs)]

use dashmap::DashMap;
use pageproof_cache::MethodVersion;
use pageproof_engine::{
    AnalysisProvider, AnalysisResult, ContentRef, DocumentRasterizer, PromptContext, ProviderError,
    RasterPage, RasterizeError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Initialize tracing for a test binary; safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// How the scripted provider should treat a page
#[derive(Debug, Clone)]
pub enum PageScript {
    /// Return a result
    Score(AnalysisResult),
    /// Return a provider error
    Fail(String),
    /// Return a malformed-response error
    Garble(String),
    /// Never resolve (exercises the timeout path)
    Hang,
    /// Panic inside the analysis call (exercises task-boundary isolation)
    Panic(String),
}

/// Scripted analysis provider
///
/// Scores every page with a default result unless the page content matches
/// a scripted override (keyed by the raw content bytes). Records total call
/// count, per-content call counts, and the peak number of concurrently
/// executing calls, so tests can assert both cache behavior and the global
/// concurrency bound.
pub struct ScriptedProvider {
    method: MethodVersion,
    default: AnalysisResult,
    scripts: DashMap<Vec<u8>, PageScript>,
    calls: AtomicUsize,
    calls_by_content: DashMap<Vec<u8>, usize>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: Duration,
}

impl ScriptedProvider {
    pub fn new(default_score: f64) -> Self {
        Self {
            method: MethodVersion::new("scripted", "v1"),
            default: AnalysisResult::with_score(default_score),
            scripts: DashMap::new(),
            calls: AtomicUsize::new(0),
            calls_by_content: DashMap::new(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Simulate provider latency per call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Use a distinct method version (invalidates prior cache entries)
    #[must_use]
    pub fn with_method(mut self, method: MethodVersion) -> Self {
        self.method = method;
        self
    }

    /// Script a specific outcome for pages with this exact content
    pub fn script(&self, content: impl Into<Vec<u8>>, script: PageScript) {
        self.scripts.insert(content.into(), script);
    }

    /// Total provider invocations
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invocations for one specific page content
    pub fn calls_for(&self, content: &[u8]) -> usize {
        self.calls_by_content
            .get(content)
            .map(|c| *c)
            .unwrap_or(0)
    }

    /// Peak number of concurrently executing analyze calls
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AnalysisProvider for ScriptedProvider {
    fn method_version(&self) -> MethodVersion {
        self.method.clone()
    }

    async fn analyze(
        &self,
        content: &[u8],
        _prompt: &PromptContext,
    ) -> Result<AnalysisResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.calls_by_content.entry(content.to_vec()).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let script = self.scripts.get(content).map(|s| s.clone());
        let result = match script {
            Some(PageScript::Score(result)) => Ok(result),
            Some(PageScript::Fail(message)) => Err(ProviderError::Provider(message)),
            Some(PageScript::Garble(message)) => Err(ProviderError::Parse(message)),
            Some(PageScript::Hang) => {
                // Held forever; the executor's deadline cuts this off. The
                // gauge is decremented here so peak tracking stays simple.
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return std::future::pending().await;
            }
            Some(PageScript::Panic(message)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("{message}");
            }
            None => Ok(self.default.clone()),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// In-memory document rasterizer
///
/// Maps document paths to preloaded page byte buffers; unknown paths fail
/// with a rasterization error, which exercises the degraded-document path.
#[derive(Default)]
pub struct MemoryRasterizer {
    documents: DashMap<PathBuf, Vec<Vec<u8>>>,
}

impl MemoryRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document with the given page contents
    pub fn add_document(&self, path: impl Into<PathBuf>, pages: Vec<Vec<u8>>) {
        self.documents.insert(path.into(), pages);
    }
}

#[async_trait::async_trait]
impl DocumentRasterizer for MemoryRasterizer {
    async fn page_count(&self, document: &Path) -> Result<u32, RasterizeError> {
        self.documents
            .get(document)
            .map(|pages| pages.len() as u32)
            .ok_or_else(|| RasterizeError::Unsupported(document.display().to_string()))
    }

    async fn rasterize(&self, document: &Path) -> Result<Vec<RasterPage>, RasterizeError> {
        let pages = self
            .documents
            .get(document)
            .ok_or_else(|| RasterizeError::Unsupported(document.display().to_string()))?;
        Ok(pages
            .iter()
            .enumerate()
            .map(|(i, bytes)| RasterPage::new(i as u32 + 1, ContentRef::from_bytes(bytes.clone())))
            .collect())
    }
}

/// Page bytes that are unique per (document, page)
pub fn page_bytes(document: &str, page: u32) -> Vec<u8> {
    format!("{document}::page::{page}").into_bytes()
}

/// A rasterizer preloaded with `docs` documents of `pages` pages each,
/// returning the registered paths
pub fn seeded_rasterizer(docs: usize, pages: u32) -> (MemoryRasterizer, Vec<PathBuf>) {
    let rasterizer = MemoryRasterizer::new();
    let mut paths = Vec::with_capacity(docs);
    for d in 0..docs {
        let name = format!("doc-{d}.pdf");
        let content: Vec<Vec<u8>> = (1..=pages).map(|p| page_bytes(&name, p)).collect();
        rasterizer.add_document(&name, content);
        paths.push(PathBuf::from(name));
    }
    (rasterizer, paths)
}
