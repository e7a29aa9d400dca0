//! Core types for the batch validation engine
//!
//! Defines the data model the engine moves through its pipeline:
//! - Work units and page content references
//! - Analysis results, violations and severities
//! - Page results, document verdicts and the batch report
//! - Engine configuration

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

/// Unique batch run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Ulid);

impl BatchId {
    /// Generate new batch ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document identifier derived from the source path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create from an explicit name
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive from a document path (file stem, falling back to the whole path)
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self(id)
    }

    /// The identifier as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to one rasterized page
///
/// Either the bytes themselves or a path to fetch them from. Cheap to clone.
#[derive(Debug, Clone)]
pub enum ContentRef {
    /// In-memory page bytes
    Bytes(Arc<[u8]>),
    /// Path to the rasterized page on disk
    Path(PathBuf),
}

impl ContentRef {
    /// Create from owned bytes
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into().into())
    }

    /// Load the page bytes
    ///
    /// # Errors
    /// Returns error if a `Path` variant cannot be read
    pub async fn load(&self) -> std::io::Result<Arc<[u8]>> {
        match self {
            ContentRef::Bytes(bytes) => Ok(Arc::clone(bytes)),
            ContentRef::Path(path) => {
                let bytes = tokio::fs::read(path).await?;
                Ok(bytes.into())
            }
        }
    }
}

/// One page of one document awaiting analysis
///
/// Immutable; discarded once its [`PageResult`] is recorded.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    /// Owning document
    pub document_id: DocumentId,
    /// 1-based page number
    pub page_number: u32,
    /// Rasterized page content
    pub content: ContentRef,
}

impl WorkUnit {
    /// Create a new work unit
    #[inline]
    #[must_use]
    pub fn new(document_id: DocumentId, page_number: u32, content: ContentRef) -> Self {
        Self {
            document_id,
            page_number,
            content,
        }
    }

    /// Label used in progress logs (`doc p3`)
    #[inline]
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} p{}", self.document_id, self.page_number)
    }
}

/// A page produced by a rasterizer
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 1-based page number
    pub page_number: u32,
    /// Rasterized content
    pub content: ContentRef,
}

impl RasterPage {
    /// Create a new raster page
    #[inline]
    #[must_use]
    pub fn new(page_number: u32, content: ContentRef) -> Self {
        Self {
            page_number,
            content,
        }
    }
}

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    /// Cosmetic issue
    Minor,
    /// Noticeable brand deviation
    Major,
    /// Blocks a passing verdict regardless of score
    Critical,
}

/// A single brand-compliance violation reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Rule identifier (e.g. `color.palette`)
    pub rule: String,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
}

impl Violation {
    /// Create a new violation
    #[inline]
    #[must_use]
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
        }
    }
}

/// Result of analyzing one page, as returned by the provider
///
/// Scores are on a 0-10 scale. This is also the value cached on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Quality score, 0-10
    pub score: f64,
    /// Violations found on the page
    pub violations: Vec<Violation>,
    /// Optional free-text critique
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl AnalysisResult {
    /// Create a result with just a score
    #[inline]
    #[must_use]
    pub fn with_score(score: f64) -> Self {
        Self {
            score,
            violations: Vec::new(),
            summary: None,
        }
    }

    /// Add a violation
    #[inline]
    #[must_use]
    pub fn with_violation(mut self, violation: Violation) -> Self {
        self.violations.push(violation);
        self
    }
}

/// Brand-profile context passed through to the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    /// QA profile identifier (from the job config)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Extra reviewer instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl PromptContext {
    /// Context for a named QA profile
    #[inline]
    #[must_use]
    pub fn for_profile(profile: impl Into<String>) -> Self {
        Self {
            profile: Some(profile.into()),
            instructions: None,
        }
    }
}

/// Outcome of one work unit
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Analysis produced a result
    Success {
        /// Quality score, 0-10
        score: f64,
        /// Violations found on the page
        violations: Vec<Violation>,
    },
    /// Analysis failed; the failure is data, not an exception
    Failure {
        /// Failure classification
        kind: FailureKind,
        /// Failure detail
        message: String,
    },
}

/// Outcome of one work unit, as recorded by the executor
///
/// Never mutated after creation.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// 1-based page number
    pub page_number: u32,
    /// Success or typed failure
    pub outcome: PageOutcome,
    /// Whether the result was served from cache
    pub from_cache: bool,
    /// Wall-clock duration of the execute call
    pub duration: Duration,
}

impl PageResult {
    /// Whether the page was analyzed successfully
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PageOutcome::Success { .. })
    }

    /// The score, if successful
    #[inline]
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match &self.outcome {
            PageOutcome::Success { score, .. } => Some(*score),
            PageOutcome::Failure { .. } => None,
        }
    }
}

/// Letter grade derived from an aggregate score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Grade bands over the 0-10 score scale
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Grade::A
        } else if score >= 8.0 {
            Grade::B
        } else if score >= 7.0 {
            Grade::C
        } else if score >= 5.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{s}")
    }
}

/// Aggregated verdict for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVerdict {
    /// Document identifier
    pub document_id: DocumentId,
    /// Pages the document decomposed into
    pub total_pages: u32,
    /// Pages analyzed successfully
    pub successful_pages: u32,
    /// Pages whose analysis failed
    pub failed_pages: u32,
    /// Mean score over successful pages (0 when none succeeded)
    pub aggregate_score: f64,
    /// Letter grade for the aggregate score
    pub grade: Grade,
    /// All violations across pages, in page order
    pub violations: Vec<Violation>,
    /// Passing requires zero critical violations and score >= threshold
    pub passed: bool,
    /// Set when the document could not be processed at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentVerdict {
    /// Verdict for a document that could not be decomposed into pages
    ///
    /// Distinguishes "failed to process" from "processed but scored low";
    /// the remediation differs (fix the file vs fix the content).
    #[must_use]
    pub fn failed(document_id: DocumentId, error: impl Into<String>) -> Self {
        Self {
            document_id,
            total_pages: 0,
            successful_pages: 0,
            failed_pages: 0,
            aggregate_score: 0.0,
            grade: Grade::F,
            violations: Vec::new(),
            passed: false,
            error: Some(error.into()),
        }
    }

    /// Whether any violation is critical
    #[inline]
    #[must_use]
    pub fn has_critical_violations(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == Severity::Critical)
    }
}

/// Aggregated report over a whole batch run
///
/// The engine's sole externally visible artifact; downstream report
/// generators consume it read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Batch run identifier
    pub batch_id: BatchId,
    /// When the run started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Per-document verdicts, in submission order
    pub documents: Vec<DocumentVerdict>,
    /// Total pages across all documents
    pub total_pages: u64,
    /// Pages served from cache
    pub cached_pages: u64,
    /// Pages analyzed by the provider
    pub analyzed_pages: u64,
    /// Pages whose analysis failed
    pub failed_pages: u64,
    /// Mean aggregate score over documents with at least one scored page
    pub average_score: f64,
    /// Wall-clock duration of the run in milliseconds
    pub wall_clock_ms: u64,
    /// cached / (cached + analyzed), as a percentage
    pub cache_hit_rate: f64,
}

impl BatchReport {
    /// Whether every document passed
    ///
    /// Callers map this to their exit status convention.
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.documents.iter().all(|d| d.passed)
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Global bound on simultaneously in-flight provider calls
    pub concurrency: usize,
    /// Per-page analysis deadline in milliseconds
    pub page_timeout_ms: u64,
    /// Minimum aggregate score for a document to pass
    pub pass_threshold: f64,
    /// Whether result caching is enabled
    pub cache_enabled: bool,
    /// Directory for the persistent cache (memory-only when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Capacity of the in-memory cache layer
    pub memory_cache_capacity: u64,
    /// Brand-profile context handed to the provider
    #[serde(default)]
    pub prompt: PromptContext,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With per-page timeout
    #[inline]
    #[must_use]
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With pass threshold
    #[inline]
    #[must_use]
    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    /// With caching enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// With a persistent cache directory
    #[inline]
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// With prompt context
    #[inline]
    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptContext) -> Self {
        self.prompt = prompt;
        self
    }

    /// Per-page deadline as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            page_timeout_ms: 120_000,
            pass_threshold: 7.0,
            cache_enabled: true,
            cache_dir: None,
            memory_cache_capacity: 10_000,
            prompt: PromptContext::default(),
        }
    }
}
