//! PageProof Cache - Content-addressed analysis result cache
//!
//! Maps a content fingerprint to a previously computed analysis result so
//! identical page content never pays for a second provider call:
//! - [`Fingerprint`] / [`MethodVersion`] derive the stable cache key
//! - [`DiskStore`] persists entries across runs (file-per-fingerprint JSON,
//!   atomically replaced)
//! - [`AnalysisCache`] fronts the store with a bounded moka layer and
//!   degrades storage failures to misses
//!
//! # Example
//!
//! ```rust,ignore
//! use pageproof_cache::{AnalysisCache, Fingerprint, MethodVersion};
//!
//! # async fn example() {
//! let cache: AnalysisCache<f64> = AnalysisCache::persistent(10_000, ".pageproof-cache");
//! let method = MethodVersion::new("vision-critic", "v3");
//! let key = Fingerprint::compute(b"page bytes", &method);
//!
//! if cache.lookup(&key).await.is_none() {
//!     cache.store(key, 9.0).await;
//! }
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod fingerprint;
pub mod store;

pub use cache::{AnalysisCache, CacheStats};
pub use fingerprint::{Fingerprint, FingerprintError, MethodVersion};
pub use store::{CacheEntry, CacheError, DiskStore};
