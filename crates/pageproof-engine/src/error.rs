//! Error types for the batch validation engine
//!
//! Page-level failures are contained at the executor boundary and surface
//! as data (`PageOutcome::Failure`), never as `Err` propagating through the
//! limiter or the document processor. The enums here are the typed payload
//! of that containment.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Classification of a page-level analysis failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Provider call exceeded the per-page deadline
    Timeout,
    /// Provider reported an error
    Provider,
    /// Provider response could not be interpreted as a result
    Parse,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Provider => write!(f, "provider error"),
            FailureKind::Parse => write!(f, "parse error"),
        }
    }
}

/// Errors reported by an analysis provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider-side failure (network, quota, refusal)
    #[error("provider error: {0}")]
    Provider(String),

    /// Response arrived but could not be decoded as a result
    #[error("malformed provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// The failure kind this error maps to
    #[inline]
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Provider(_) => FailureKind::Provider,
            ProviderError::Parse(_) => FailureKind::Parse,
        }
    }
}

/// Errors decomposing a document into pages
#[derive(Debug, thiserror::Error)]
pub enum RasterizeError {
    /// Document could not be read
    #[error("document unreadable: {0}")]
    Io(#[from] std::io::Error),

    /// Document format not supported by the rasterizer
    #[error("unsupported document: {0}")]
    Unsupported(String),

    /// Rasterization itself failed
    #[error("rasterization failed: {0}")]
    Failed(String),
}
