//! Stage 4: related submissions via profile-signature contacts.

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::models::{DuplicateVerdict, SubmissionFingerprint};
use crate::storage::FingerprintStore;

/// Looks for other users whose stored content features match this user's
/// profile-signature contacts.
///
/// Catches the account-hopping pattern: the same URL or handle promoted
/// from content yesterday shows up in a different account's bio today. The
/// submitter's own rows are excluded, so advertising your own channel in
/// both content and bio is fine.
pub(crate) struct RelatedMatchChecker {
    store: Arc<dyn FingerprintStore>,
}

impl RelatedMatchChecker {
    pub(crate) fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Returns a related verdict when any bio feature matches a stored
    /// content feature owned by a different user.
    ///
    /// Bio features are compared against their content-namespace
    /// counterpart types (`bio_url` against `url`, and so on).
    pub(crate) fn check(
        &self,
        fingerprint: &SubmissionFingerprint,
        cutoff: i64,
    ) -> Result<Option<DuplicateVerdict>> {
        let bio_features = fingerprint.bio_features();
        if bio_features.is_empty() {
            return Ok(None);
        }

        let mut matched: Vec<(String, String)> = Vec::new();
        for (kind, value) in bio_features {
            let hit = self.store.find_feature_excluding_user(
                kind.content_counterpart(),
                value,
                cutoff,
                fingerprint.user_id,
            )?;
            if hit.is_some() {
                matched.push((kind.as_str().to_string(), value.to_string()));
            }
        }

        if matched.is_empty() {
            return Ok(None);
        }

        debug!(
            user_id = fingerprint.user_id,
            matches = matched.len(),
            "profile signature matches another user's content"
        );

        let mut verdict = DuplicateVerdict::related(matched);
        verdict.message =
            "profile signature shares contact details with another user's recent submission"
                .to_string();
        Ok(Some(verdict))
    }
}
