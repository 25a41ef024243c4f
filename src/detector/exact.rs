//! Stage 2: exact feature matching.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, TimeZone};
use tracing::debug;

use crate::Result;
use crate::config::DetectorConfig;
use crate::models::{DuplicateVerdict, FeatureKind, SubmissionFingerprint};
use crate::storage::{FeatureOwner, FingerprintStore};

/// Matches content features against the feature index by exact value.
///
/// Collects every match across all enabled dimensions before deciding, then
/// reports the oldest matching fingerprint. Reporting the oldest keeps the
/// attribution stable when a spam wave has already landed several copies.
pub(crate) struct ExactMatchChecker {
    store: Arc<dyn FingerprintStore>,
}

impl ExactMatchChecker {
    pub(crate) fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Checks the fingerprint's content features, dimension toggles applied.
    ///
    /// `cutoff` bounds the scan to the retention window. Bio features are
    /// not consulted here; they belong to the related stage.
    pub(crate) fn check(
        &self,
        fingerprint: &SubmissionFingerprint,
        cutoff: i64,
        config: &DetectorConfig,
    ) -> Result<Option<DuplicateVerdict>> {
        let mut dimensions: Vec<(FeatureKind, &[String])> = Vec::new();
        if config.check_urls {
            dimensions.push((FeatureKind::Url, &fingerprint.urls));
        }
        if config.check_tg_links {
            dimensions.push((FeatureKind::TgLink, &fingerprint.tg_links));
            dimensions.push((FeatureKind::TgUsername, &fingerprint.tg_usernames));
        }
        if config.check_contacts {
            dimensions.push((FeatureKind::Phone, &fingerprint.phone_numbers));
            dimensions.push((FeatureKind::Email, &fingerprint.emails));
        }

        if dimensions.iter().all(|(_, values)| values.is_empty()) {
            return Ok(None);
        }

        // One windowed scan, then in-memory lookups per dimension. The index
        // keeps the oldest owner per (type, value) so attribution is stable.
        let mut index: HashMap<(String, String), FeatureOwner> = HashMap::new();
        for row in self.store.scan_features_since(cutoff)? {
            let owner = FeatureOwner {
                fingerprint_id: row.fingerprint_id,
                submit_time: row.submit_time,
            };
            index
                .entry((row.feature_type, row.feature_value))
                .and_modify(|existing| {
                    if owner.submit_time < existing.submit_time {
                        *existing = owner;
                    }
                })
                .or_insert(owner);
        }

        let mut matched: Vec<(FeatureKind, String)> = Vec::new();
        let mut oldest: Option<FeatureOwner> = None;
        for (kind, values) in dimensions {
            for value in values {
                let key = (kind.as_str().to_string(), value.clone());
                if let Some(owner) = index.get(&key) {
                    matched.push((kind, value.clone()));
                    match oldest {
                        Some(current) if current.submit_time <= owner.submit_time => {}
                        _ => oldest = Some(*owner),
                    }
                }
            }
        }

        let Some(original) = oldest else {
            return Ok(None);
        };

        debug!(
            user_id = fingerprint.user_id,
            matches = matched.len(),
            original_id = original.fingerprint_id,
            "exact feature match"
        );

        let message = build_message(&matched, original.submit_time);
        let matched_features = matched
            .into_iter()
            .map(|(kind, value)| (kind.as_str().to_string(), value))
            .collect();

        Ok(Some(DuplicateVerdict::exact(
            matched_features,
            original.fingerprint_id,
            original.submit_time,
            message,
        )))
    }
}

/// Builds the user-facing explanation: when the original was seen, up to
/// three matched features, and a count when there are more.
fn build_message(matched: &[(FeatureKind, String)], original_submit_time: i64) -> String {
    let when = Local
        .timestamp_opt(original_submit_time, 0)
        .single()
        .map_or_else(
            || original_submit_time.to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
        );

    let mut message = format!("shares features with a submission from {when}:");
    for (kind, value) in matched.iter().take(3) {
        let shown: String = value.chars().take(30).collect();
        message.push_str(&format!("\n- {}: {shown}", kind.display_name()));
    }
    if matched.len() > 3 {
        message.push_str(&format!("\n...and {} matching features in total", matched.len()));
    }
    message
}
