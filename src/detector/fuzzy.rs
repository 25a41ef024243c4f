//! Stage 3: fuzzy content matching via SimHash distance.

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::extract::{MAX_DISTANCE, simhash_distance};
use crate::models::{DuplicateVerdict, SubmissionFingerprint};
use crate::storage::FingerprintStore;

/// Compares the submission's SimHash against every stored hash in the
/// window and flags the first one whose similarity crosses the threshold.
///
/// First qualifying hit wins, not the closest one: the stage answers "is
/// this a near-duplicate of anything", and any hit over the threshold is
/// answer enough.
pub(crate) struct FuzzyMatchChecker {
    store: Arc<dyn FingerprintStore>,
}

impl FuzzyMatchChecker {
    pub(crate) fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Returns a fuzzy verdict when a stored hash is at least `threshold`
    /// similar, where similarity is `1 - distance / 64`.
    ///
    /// Empty and degenerate (non 16-hex) hashes never match: the distance
    /// function reports them as maximally dissimilar, and an empty own hash
    /// skips the scan entirely.
    pub(crate) fn check(
        &self,
        fingerprint: &SubmissionFingerprint,
        cutoff: i64,
        threshold: f64,
    ) -> Result<Option<DuplicateVerdict>> {
        if fingerprint.content_hash.is_empty() {
            return Ok(None);
        }

        for row in self.store.scan_content_hashes_since(cutoff)? {
            let distance = simhash_distance(&fingerprint.content_hash, &row.content_hash);
            let similarity = 1.0 - f64::from(distance) / f64::from(MAX_DISTANCE);
            if similarity >= threshold {
                debug!(
                    user_id = fingerprint.user_id,
                    original_id = row.fingerprint_id,
                    distance,
                    similarity,
                    "fuzzy content match"
                );
                return Ok(Some(DuplicateVerdict::fuzzy(
                    similarity,
                    row.fingerprint_id,
                    row.submit_time,
                )));
            }
        }

        Ok(None)
    }
}
