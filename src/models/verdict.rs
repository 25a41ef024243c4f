//! Detection verdicts.

use serde::{Deserialize, Serialize};

/// Why a submission was classified as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    /// The user exceeded the approved-submission rate limit.
    RateLimit,
    /// A content feature (URL, TG link, contact) matched exactly.
    Exact,
    /// The SimHash similarity crossed the configured threshold.
    Fuzzy,
    /// A profile-signature contact matched another user's content feature.
    Related,
}

impl std::fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Exact => write!(f, "exact"),
            Self::Fuzzy => write!(f, "fuzzy"),
            Self::Related => write!(f, "related"),
        }
    }
}

/// Result of a duplicate check.
///
/// `matched_features` holds `(feature_type, feature_value)` pairs for the
/// signals that triggered the verdict. For fuzzy matches it carries a single
/// synthetic `content_similarity` entry with the similarity percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    /// Whether the submission should be blocked as a duplicate.
    pub is_duplicate: bool,

    /// Classification of the hit, `None` when unique.
    pub kind: Option<DuplicateKind>,

    /// Signals that matched, `(feature_type, feature_value)`.
    pub matched_features: Vec<(String, String)>,

    /// Similarity score in `[0, 1]`. Exact and rate-limit hits report 1.0,
    /// related hits a fixed 0.9.
    pub similarity_score: f64,

    /// Row id of the original fingerprint that matched, when known.
    pub original_fingerprint_id: Option<i64>,

    /// Submit time of the original fingerprint, when known.
    pub original_submit_time: Option<i64>,

    /// Human-readable explanation for the submitter/moderators.
    pub message: String,

    /// Set when a storage failure forced a fail-open stage. A degraded
    /// unique verdict means "nothing found, but not everything was
    /// checked", so operators can alert on this.
    pub degraded: bool,
}

impl DuplicateVerdict {
    /// A unique (not duplicate) verdict.
    #[must_use]
    pub const fn unique() -> Self {
        Self {
            is_duplicate: false,
            kind: None,
            matched_features: Vec::new(),
            similarity_score: 0.0,
            original_fingerprint_id: None,
            original_submit_time: None,
            message: String::new(),
            degraded: false,
        }
    }

    /// A rate-limit verdict. Ignores content entirely.
    #[must_use]
    pub const fn rate_limited(message: String) -> Self {
        Self {
            is_duplicate: true,
            kind: Some(DuplicateKind::RateLimit),
            matched_features: Vec::new(),
            similarity_score: 1.0,
            original_fingerprint_id: None,
            original_submit_time: None,
            message,
            degraded: false,
        }
    }

    /// An exact-match verdict carrying every matched feature.
    #[must_use]
    pub const fn exact(
        matched_features: Vec<(String, String)>,
        original_fingerprint_id: i64,
        original_submit_time: i64,
        message: String,
    ) -> Self {
        Self {
            is_duplicate: true,
            kind: Some(DuplicateKind::Exact),
            matched_features,
            similarity_score: 1.0,
            original_fingerprint_id: Some(original_fingerprint_id),
            original_submit_time: Some(original_submit_time),
            message,
            degraded: false,
        }
    }

    /// A fuzzy (SimHash) verdict.
    #[must_use]
    pub fn fuzzy(
        similarity: f64,
        original_fingerprint_id: i64,
        original_submit_time: i64,
    ) -> Self {
        Self {
            is_duplicate: true,
            kind: Some(DuplicateKind::Fuzzy),
            matched_features: vec![(
                "content_similarity".to_string(),
                format!("{:.0}%", similarity * 100.0),
            )],
            similarity_score: similarity,
            original_fingerprint_id: Some(original_fingerprint_id),
            original_submit_time: Some(original_submit_time),
            message: format!(
                "content is {:.0}% similar to a recent approved submission",
                similarity * 100.0
            ),
            degraded: false,
        }
    }

    /// A related-by-signature verdict. Fixed 0.9 score.
    #[must_use]
    pub const fn related(matched_features: Vec<(String, String)>) -> Self {
        Self {
            is_duplicate: true,
            kind: Some(DuplicateKind::Related),
            matched_features,
            similarity_score: 0.9,
            original_fingerprint_id: None,
            original_submit_time: None,
            message: String::new(),
            degraded: false,
        }
    }

    /// Marks the verdict as produced by a degraded (fail-open) check.
    #[must_use]
    pub const fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }
}

impl Default for DuplicateVerdict {
    fn default() -> Self {
        Self::unique()
    }
}
