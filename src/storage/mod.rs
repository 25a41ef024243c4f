//! Fingerprint persistence.
//!
//! The [`FingerprintStore`] trait is the full storage contract the detector
//! needs: transactional inserts, point lookups, range scans by submit time,
//! and batch delete. Any backend offering those operations will do; the
//! bundled implementation is [`SqliteStore`].

mod sqlite;

pub use sqlite::SqliteStore;

use crate::Result;
use crate::models::{FingerprintStatus, SubmissionFingerprint};

/// One row of the denormalized feature index, joined with its fingerprint's
/// submit time.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    /// Feature type string (`url`, `tg_link`, `bio_contact`, ...).
    pub feature_type: String,
    /// Normalized feature value.
    pub feature_value: String,
    /// Owning fingerprint row id.
    pub fingerprint_id: i64,
    /// Owning fingerprint's submit time.
    pub submit_time: i64,
}

/// One stored content hash with its owning fingerprint metadata.
#[derive(Debug, Clone)]
pub struct ContentHashRow {
    /// Fingerprint row id.
    pub fingerprint_id: i64,
    /// Stored content hash (non-empty).
    pub content_hash: String,
    /// Fingerprint submit time.
    pub submit_time: i64,
    /// Submitting user's id.
    pub user_id: i64,
}

/// Identity of the fingerprint owning a matched feature.
#[derive(Debug, Clone, Copy)]
pub struct FeatureOwner {
    /// Fingerprint row id.
    pub fingerprint_id: i64,
    /// Fingerprint submit time.
    pub submit_time: i64,
}

/// Storage contract for the duplicate detector.
///
/// All scan operations return **approved** fingerprints only: pending and
/// rejected records never participate in detection.
pub trait FingerprintStore: Send + Sync {
    /// Inserts a fingerprint row plus one feature-index row per extracted
    /// feature, atomically: either everything lands or nothing does.
    ///
    /// Returns the new fingerprint row id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the transaction fails.
    fn insert_fingerprint(
        &self,
        fingerprint: &SubmissionFingerprint,
        status: FingerprintStatus,
        submission_id: Option<i64>,
    ) -> Result<i64>;

    /// Counts a user's approved fingerprints with `submit_time > since`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] on query failure.
    fn count_approved_by_user_since(&self, user_id: i64, since: i64) -> Result<u64>;

    /// All feature-index rows of approved fingerprints with
    /// `submit_time > since`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] on query failure.
    fn scan_features_since(&self, since: i64) -> Result<Vec<FeatureRow>>;

    /// All non-empty content hashes of approved fingerprints with
    /// `submit_time > since`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] on query failure.
    fn scan_content_hashes_since(&self, since: i64) -> Result<Vec<ContentHashRow>>;

    /// Finds one approved fingerprint owning `(feature_type,
    /// feature_value)` with `submit_time > since`, excluding rows owned by
    /// `exclude_user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] on query failure.
    fn find_feature_excluding_user(
        &self,
        feature_type: &str,
        feature_value: &str,
        since: i64,
        exclude_user_id: i64,
    ) -> Result<Option<FeatureOwner>>;

    /// Deletes fingerprints with `submit_time < cutoff` along with every
    /// feature-index row that references them, atomically. Returns the
    /// number of fingerprint rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the transaction fails.
    fn delete_fingerprints_before(&self, cutoff: i64) -> Result<usize>;
}
