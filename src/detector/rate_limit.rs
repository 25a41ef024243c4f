//! Stage 1: per-user approval rate limit.

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::config::DetectorConfig;
use crate::current_timestamp;
use crate::models::DuplicateVerdict;
use crate::storage::FingerprintStore;

/// Counts a user's recent approved submissions against the configured cap.
///
/// Runs before any content inspection: a user over the cap is refused even
/// when every submission is brand new. Only approved fingerprints count, so
/// rejected spam attempts do not burn the quota.
pub(crate) struct RateLimitChecker {
    store: Arc<dyn FingerprintStore>,
}

impl RateLimitChecker {
    pub(crate) fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Returns a rate-limit verdict when the user has reached the cap.
    ///
    /// The window is `rate_limit_window_hours`, independent of the retention
    /// window used by the content stages.
    pub(crate) fn check(
        &self,
        user_id: i64,
        config: &DetectorConfig,
    ) -> Result<Option<DuplicateVerdict>> {
        let since = current_timestamp() - config.rate_window_seconds();
        let count = self.store.count_approved_by_user_since(user_id, since)?;

        if count >= u64::from(config.rate_limit_count) {
            debug!(user_id, count, limit = config.rate_limit_count, "rate limit reached");
            return Ok(Some(DuplicateVerdict::rate_limited(format!(
                "{count} approved submissions in the last {} hours, limit is {}",
                config.rate_limit_window_hours, config.rate_limit_count
            ))));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FeatureExtractor;
    use crate::models::FingerprintStatus;
    use crate::storage::SqliteStore;

    fn store_with_approved(user_id: i64, count: usize) -> Arc<SqliteStore> {
        let store = SqliteStore::in_memory().unwrap();
        let extractor = FeatureExtractor::new();
        for i in 0..count {
            let fp = extractor.create_fingerprint(
                user_id,
                "user",
                &format!("submission number {i} with enough words"),
                None,
            );
            store
                .insert_fingerprint(&fp, FingerprintStatus::Approved, None)
                .unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn test_under_limit_passes() {
        let store = store_with_approved(1, 2);
        let checker = RateLimitChecker::new(store);
        let config = DetectorConfig::default();
        assert!(checker.check(1, &config).unwrap().is_none());
    }

    #[test]
    fn test_at_limit_blocks() {
        let store = store_with_approved(1, 3);
        let checker = RateLimitChecker::new(store);
        let config = DetectorConfig::default();
        let verdict = checker.check(1, &config).unwrap().unwrap();
        assert!(verdict.is_duplicate);
        assert!(verdict.message.contains("24 hours"));
    }

    #[test]
    fn test_other_users_do_not_count() {
        let store = store_with_approved(1, 3);
        let checker = RateLimitChecker::new(store);
        let config = DetectorConfig::default();
        assert!(checker.check(2, &config).unwrap().is_none());
    }

    #[test]
    fn test_pending_submissions_do_not_count() {
        let store = SqliteStore::in_memory().unwrap();
        let extractor = FeatureExtractor::new();
        for i in 0..5 {
            let fp = extractor.create_fingerprint(1, "user", &format!("pending text {i}"), None);
            store
                .insert_fingerprint(&fp, FingerprintStatus::Pending, None)
                .unwrap();
        }
        let checker = RateLimitChecker::new(Arc::new(store));
        assert!(checker.check(1, &DetectorConfig::default()).unwrap().is_none());
    }
}
