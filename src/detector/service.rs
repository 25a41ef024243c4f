//! Pipeline orchestrator.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::config::DetectorConfig;
use crate::current_timestamp;
use crate::models::{DuplicateVerdict, FingerprintStatus, SubmissionFingerprint};
use crate::storage::FingerprintStore;

use super::exact::ExactMatchChecker;
use super::fuzzy::FuzzyMatchChecker;
use super::rate_limit::RateLimitChecker;
use super::related::RelatedMatchChecker;

/// Runs the four detection stages in priority order and owns the fail-open
/// policy.
///
/// [`check`](Self::check) never returns an error: a storage failure in one
/// stage is logged, the stage is skipped, and the final verdict carries
/// `degraded = true` so callers can tell "unique" from "unable to check".
/// Availability of the submission flow wins over detection completeness.
pub struct DuplicateDetector {
    config: DetectorConfig,
    store: Arc<dyn FingerprintStore>,
    rate_limit: RateLimitChecker,
    exact: ExactMatchChecker,
    fuzzy: FuzzyMatchChecker,
    related: RelatedMatchChecker,
}

impl DuplicateDetector {
    /// Creates a detector over `store`, validating `config` first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(store: Arc<dyn FingerprintStore>, config: DetectorConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            rate_limit: RateLimitChecker::new(Arc::clone(&store)),
            exact: ExactMatchChecker::new(Arc::clone(&store)),
            fuzzy: FuzzyMatchChecker::new(Arc::clone(&store)),
            related: RelatedMatchChecker::new(Arc::clone(&store)),
            store,
            config,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Checks one submission fingerprint against the stored corpus.
    ///
    /// Stage order is fixed: rate limit, exact, fuzzy, related. The first
    /// hit wins and later stages never run. When the detector is disabled
    /// every submission is unique.
    #[must_use]
    #[instrument(skip(self, fingerprint), fields(user_id = fingerprint.user_id))]
    pub fn check(&self, fingerprint: &SubmissionFingerprint) -> DuplicateVerdict {
        if !self.config.enabled {
            debug!("duplicate detection disabled");
            return DuplicateVerdict::unique();
        }

        let started = Instant::now();
        let cutoff = current_timestamp() - self.config.window_seconds();
        let mut degraded = false;

        if self.config.rate_limit_enabled {
            let outcome = self.rate_limit.check(fingerprint.user_id, &self.config);
            if let Some(verdict) = settle("rate_limit", outcome, &mut degraded) {
                return finish(verdict, degraded, started);
            }
        }

        if self.config.check_urls || self.config.check_tg_links || self.config.check_contacts {
            let outcome = self.exact.check(fingerprint, cutoff, &self.config);
            if let Some(verdict) = settle("exact", outcome, &mut degraded) {
                return finish(verdict, degraded, started);
            }
        }

        if self.config.check_content_hash {
            let outcome = self
                .fuzzy
                .check(fingerprint, cutoff, self.config.similarity_threshold);
            if let Some(verdict) = settle("fuzzy", outcome, &mut degraded) {
                return finish(verdict, degraded, started);
            }
        }

        if self.config.check_user_bio {
            let outcome = self.related.check(fingerprint, cutoff);
            if let Some(verdict) = settle("related", outcome, &mut degraded) {
                return finish(verdict, degraded, started);
            }
        }

        if degraded {
            metrics::counter!("dedup_degraded_checks_total").increment(1);
        }
        metrics::counter!("dedup_checks_total", "result" => "unique").increment(1);
        record_duration(started);
        DuplicateVerdict::unique().with_degraded(degraded)
    }

    /// Persists a fingerprint, returning its row id.
    ///
    /// Storage failures are logged and swallowed: losing one fingerprint
    /// degrades future detection slightly, failing the submission does not
    /// help anyone.
    #[must_use]
    pub fn save_fingerprint(
        &self,
        fingerprint: &SubmissionFingerprint,
        status: FingerprintStatus,
        submission_id: Option<i64>,
    ) -> Option<i64> {
        match self
            .store
            .insert_fingerprint(fingerprint, status, submission_id)
        {
            Ok(id) => {
                debug!(
                    user_id = fingerprint.user_id,
                    fingerprint_id = id,
                    status = %status,
                    "fingerprint saved"
                );
                metrics::counter!("dedup_fingerprints_saved_total").increment(1);
                Some(id)
            }
            Err(err) => {
                error!(user_id = fingerprint.user_id, error = %err, "failed to save fingerprint");
                None
            }
        }
    }

    /// Deletes fingerprints older than the retention window. Returns the
    /// number removed, 0 on failure.
    #[instrument(skip(self))]
    pub fn cleanup_expired_fingerprints(&self) -> usize {
        let cutoff = current_timestamp() - self.config.window_seconds();
        match self.store.delete_fingerprints_before(cutoff) {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(deleted, cutoff, "expired fingerprints removed");
                }
                metrics::counter!("dedup_fingerprints_expired_total")
                    .increment(u64::try_from(deleted).unwrap_or(u64::MAX));
                deleted
            }
            Err(err) => {
                error!(error = %err, "fingerprint cleanup failed");
                0
            }
        }
    }
}

/// Resolves one stage outcome: a hit short-circuits, a failure is logged
/// and marks the check degraded.
fn settle(
    stage: &'static str,
    outcome: crate::Result<Option<DuplicateVerdict>>,
    degraded: &mut bool,
) -> Option<DuplicateVerdict> {
    match outcome {
        Ok(Some(verdict)) => {
            let kind = verdict
                .kind
                .map_or_else(|| "unknown".to_string(), |k| k.to_string());
            info!(stage, kind = %kind, similarity = verdict.similarity_score, "duplicate detected");
            metrics::counter!("dedup_checks_total", "result" => "duplicate").increment(1);
            metrics::counter!("dedup_duplicates_total", "kind" => kind).increment(1);
            Some(verdict)
        }
        Ok(None) => None,
        Err(err) => {
            // Fail open: skip the stage, keep the submission moving.
            warn!(stage, error = %err, "stage failed, skipping");
            metrics::counter!("dedup_stage_failures_total", "stage" => stage).increment(1);
            *degraded = true;
            None
        }
    }
}

fn finish(verdict: DuplicateVerdict, degraded: bool, started: Instant) -> DuplicateVerdict {
    if degraded {
        metrics::counter!("dedup_degraded_checks_total").increment(1);
    }
    record_duration(started);
    verdict.with_degraded(degraded)
}

fn record_duration(started: Instant) {
    metrics::histogram!("dedup_check_duration_seconds").record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::extract::FeatureExtractor;
    use crate::models::DuplicateKind;
    use crate::storage::{ContentHashRow, FeatureOwner, FeatureRow, SqliteStore};

    fn detector_with_store(config: DetectorConfig) -> (DuplicateDetector, Arc<SqliteStore>) {
        let store = SqliteStore::in_memory().unwrap();
        let store = Arc::new(store);
        let detector =
            DuplicateDetector::new(Arc::clone(&store) as Arc<dyn FingerprintStore>, config)
                .unwrap();
        (detector, store)
    }

    fn enabled_config() -> DetectorConfig {
        DetectorConfig {
            enabled: true,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn test_disabled_detector_passes_everything() {
        let (detector, _store) = detector_with_store(DetectorConfig::default());
        let extractor = FeatureExtractor::new();

        let first =
            extractor.create_fingerprint(1, "user", "visit http://spam.example.com", None);
        detector.save_fingerprint(&first, FingerprintStatus::Approved, None);

        let second =
            extractor.create_fingerprint(2, "other", "visit http://spam.example.com", None);
        assert!(!detector.check(&second).is_duplicate);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let config = DetectorConfig {
            similarity_threshold: 1.5,
            ..DetectorConfig::default()
        };
        let result = DuplicateDetector::new(Arc::new(store), config);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_exact_duplicate_detected() {
        let (detector, _store) = detector_with_store(enabled_config());
        let extractor = FeatureExtractor::new();

        let first = extractor.create_fingerprint(1, "user", "join @promo_channel today", None);
        detector
            .save_fingerprint(&first, FingerprintStatus::Approved, Some(10))
            .unwrap();

        let second = extractor.create_fingerprint(2, "other", "also join @promo_channel", None);
        let verdict = detector.check(&second);
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.kind, Some(DuplicateKind::Exact));
        assert!(!verdict.degraded);
    }

    #[test]
    fn test_rate_limit_outranks_exact() {
        let (detector, _store) = detector_with_store(enabled_config());
        let extractor = FeatureExtractor::new();

        for i in 0..3 {
            let fp = extractor.create_fingerprint(
                1,
                "user",
                &format!("post {i} with http://spam.example.com"),
                None,
            );
            detector.save_fingerprint(&fp, FingerprintStatus::Approved, None);
        }

        // Would also be an exact duplicate, but the rate limit fires first
        let fp = extractor.create_fingerprint(1, "user", "again http://spam.example.com", None);
        let verdict = detector.check(&fp);
        assert_eq!(verdict.kind, Some(DuplicateKind::RateLimit));
    }

    #[test]
    fn test_exact_outranks_fuzzy() {
        let (detector, _store) = detector_with_store(enabled_config());
        let extractor = FeatureExtractor::new();

        let text = "join the best channel http://spam.example.com for daily signals";
        let first = extractor.create_fingerprint(1, "user", text, None);
        detector.save_fingerprint(&first, FingerprintStatus::Approved, None);

        // Identical text: exact match on the URL wins over the SimHash hit
        let second = extractor.create_fingerprint(2, "other", text, None);
        let verdict = detector.check(&second);
        assert_eq!(verdict.kind, Some(DuplicateKind::Exact));
    }

    #[test]
    fn test_fuzzy_duplicate_detected() {
        let (detector, _store) = detector_with_store(enabled_config());
        let extractor = FeatureExtractor::new();

        let first = extractor.create_fingerprint(
            1,
            "user",
            "Join our amazing channel for daily crypto trading signals and market analysis today!",
            None,
        );
        detector.save_fingerprint(&first, FingerprintStatus::Approved, None);

        let second = extractor.create_fingerprint(
            2,
            "other",
            "Join our amazing channel for weekly crypto trading signals and market analysis today.",
            None,
        );
        let verdict = detector.check(&second);
        assert_eq!(verdict.kind, Some(DuplicateKind::Fuzzy));
        assert!(verdict.similarity_score >= 0.8);
    }

    #[test]
    fn test_related_duplicate_detected() {
        let (detector, _store) = detector_with_store(enabled_config());
        let extractor = FeatureExtractor::new();

        let first = extractor.create_fingerprint(
            1,
            "user",
            "check out http://channel.example.com for updates",
            None,
        );
        detector.save_fingerprint(&first, FingerprintStatus::Approved, None);

        let second = extractor.create_fingerprint(
            2,
            "other",
            "completely unrelated words about gardening",
            Some("my site: http://channel.example.com"),
        );
        let verdict = detector.check(&second);
        assert_eq!(verdict.kind, Some(DuplicateKind::Related));
    }

    #[test]
    fn test_unique_submission_passes() {
        let (detector, _store) = detector_with_store(enabled_config());
        let fp = FeatureExtractor::new().create_fingerprint(
            1,
            "user",
            "a perfectly ordinary announcement about the weather",
            None,
        );
        let verdict = detector.check(&fp);
        assert!(!verdict.is_duplicate);
        assert!(!verdict.degraded);
    }

    #[test]
    fn test_cleanup_removes_old_rows() {
        let (detector, store) = detector_with_store(enabled_config());
        let extractor = FeatureExtractor::new();

        let mut old = extractor.create_fingerprint(1, "user", "ancient history post", None);
        old.submit_time = 1_000;
        store
            .insert_fingerprint(&old, FingerprintStatus::Approved, None)
            .unwrap();
        let fresh = extractor.create_fingerprint(2, "other", "fresh post of today", None);
        store
            .insert_fingerprint(&fresh, FingerprintStatus::Approved, None)
            .unwrap();

        assert_eq!(detector.cleanup_expired_fingerprints(), 1);
        assert_eq!(store.fingerprint_count().unwrap(), 1);
    }

    /// Store whose every operation fails, for fail-open tests.
    struct BrokenStore;

    impl FingerprintStore for BrokenStore {
        fn insert_fingerprint(
            &self,
            _: &SubmissionFingerprint,
            _: FingerprintStatus,
            _: Option<i64>,
        ) -> crate::Result<i64> {
            Err(broken("insert"))
        }
        fn count_approved_by_user_since(&self, _: i64, _: i64) -> crate::Result<u64> {
            Err(broken("count"))
        }
        fn scan_features_since(&self, _: i64) -> crate::Result<Vec<FeatureRow>> {
            Err(broken("scan_features"))
        }
        fn scan_content_hashes_since(&self, _: i64) -> crate::Result<Vec<ContentHashRow>> {
            Err(broken("scan_hashes"))
        }
        fn find_feature_excluding_user(
            &self,
            _: &str,
            _: &str,
            _: i64,
            _: i64,
        ) -> crate::Result<Option<FeatureOwner>> {
            Err(broken("find_feature"))
        }
        fn delete_fingerprints_before(&self, _: i64) -> crate::Result<usize> {
            Err(broken("delete"))
        }
    }

    fn broken(operation: &str) -> Error {
        Error::Storage {
            operation: operation.to_string(),
            cause: "database unavailable".to_string(),
        }
    }

    #[test]
    fn test_storage_failure_fails_open() {
        let detector = DuplicateDetector::new(Arc::new(BrokenStore), enabled_config()).unwrap();
        let fp = FeatureExtractor::new().create_fingerprint(
            1,
            "user",
            "content with http://spam.example.com inside",
            Some("bio with http://other.example.com"),
        );
        let verdict = detector.check(&fp);
        assert!(
            !verdict.is_duplicate,
            "storage failure must not block submissions"
        );
        assert!(verdict.degraded, "fail-open verdicts must be marked degraded");
    }

    #[test]
    fn test_save_failure_swallowed() {
        let detector = DuplicateDetector::new(Arc::new(BrokenStore), enabled_config()).unwrap();
        let fp = FeatureExtractor::new().create_fingerprint(1, "user", "anything at all", None);
        assert!(
            detector
                .save_fingerprint(&fp, FingerprintStatus::Approved, None)
                .is_none()
        );
    }

    #[test]
    fn test_cleanup_failure_returns_zero() {
        let detector = DuplicateDetector::new(Arc::new(BrokenStore), enabled_config()).unwrap();
        assert_eq!(detector.cleanup_expired_fingerprints(), 0);
    }
}
