//! # Dupgate
//!
//! Duplicate-submission detection engine for moderated content channels.
//!
//! Dupgate derives identity signals (URLs, Telegram handles, phone numbers,
//! emails) and a 64-bit SimHash content fingerprint from free-text
//! submissions, then classifies each new submission as unique, rate-limited,
//! or a duplicate (exact / fuzzy / related-by-signature) against a
//! time-windowed corpus of previously approved fingerprints.
//!
//! ## Pipeline
//!
//! 1. Rate limit: per-user approved-submission count in a trailing window
//! 2. Exact match: feature-index lookups (URLs, TG links, contacts)
//! 3. Fuzzy match: Hamming distance between SimHash fingerprints
//! 4. Related match: profile-signature contacts vs. content features
//!
//! Stages short-circuit in that order; storage failures degrade to
//! fail-open (not a duplicate) rather than blocking the host flow.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dupgate::{DetectorConfig, DuplicateDetector, FeatureExtractor, SqliteStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::new("fingerprints.db")?);
//! let detector = DuplicateDetector::new(store, DetectorConfig::from_env())?;
//!
//! let extractor = FeatureExtractor::new();
//! let fp = extractor.create_fingerprint(42, "alice", "Visit http://example.com", None);
//!
//! let verdict = detector.check(&fp);
//! if !verdict.is_duplicate {
//!     // ... publish, then:
//!     detector.save_fingerprint(&fp, dupgate::FingerprintStatus::Approved, None);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod detector;
pub mod extract;
pub mod models;
pub mod observability;
pub mod storage;

// Re-exports for convenience
pub use config::DetectorConfig;
pub use detector::DuplicateDetector;
pub use extract::{FeatureExtractor, compute_content_hash, simhash_distance};
pub use models::{
    DuplicateKind, DuplicateVerdict, FeatureKind, FingerprintStatus, SubmissionFingerprint,
};
pub use storage::{FingerprintStore, SqliteStore};

/// Error type for dupgate operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// Note that the detector's public operations (`check`, `save_fingerprint`,
/// `cleanup_expired_fingerprints`) never surface `Storage` errors to callers:
/// they degrade to their safest default and log instead. `Storage` appears in
/// the [`FingerprintStore`] contract and `InvalidConfig` is raised once at
/// construction time.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration is malformed (bad threshold, zero window, ...).
    ///
    /// Raised at detector construction, never per-request.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A storage operation failed.
    ///
    /// Raised when `SQLite` connectivity or a transaction fails. The
    /// detector treats this as fail-open during `check` and
    /// swallow-and-log during `save`/`cleanup`.
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided (CLI argument parsing and the like).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A non-storage operation failed (logging init and the like).
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for dupgate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every window computation uses the same clock. Falls back
/// to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// let ts = dupgate::current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
