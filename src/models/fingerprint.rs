//! Submission fingerprints and their feature taxonomy.

use serde::{Deserialize, Serialize};

/// Current fingerprint format version.
///
/// Bump whenever extraction rules change so that records produced by
/// different rule sets can be told apart. The version is stored on every
/// row but is not yet used to partition comparisons.
pub const FINGERPRINT_VERSION: i32 = 1;

/// Category of an extracted feature.
///
/// Content-namespace kinds (`Url` .. `Email`) come from the submission
/// text; `Bio*` kinds come from the submitter's profile signature and live
/// in a separate namespace so the two are never confused in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// HTTP(S) URL from submission content.
    Url,
    /// `@handle` Telegram username from content.
    TgUsername,
    /// `t.me/...` Telegram link from content.
    TgLink,
    /// Normalized phone number from content.
    Phone,
    /// Email address from content.
    Email,
    /// URL from the submitter's profile signature.
    BioUrl,
    /// Telegram link or username from the profile signature.
    BioTgLink,
    /// WeChat/QQ/phone/email contact from the profile signature.
    BioContact,
}

impl FeatureKind {
    /// The stable string used in the feature index.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::TgUsername => "tg_username",
            Self::TgLink => "tg_link",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::BioUrl => "bio_url",
            Self::BioTgLink => "bio_tg_link",
            Self::BioContact => "bio_contact",
        }
    }

    /// Content-namespace type a bio feature is compared against.
    ///
    /// Strips the `bio_` prefix: `bio_url` → `url`, `bio_tg_link` →
    /// `tg_link`, `bio_contact` → `contact`. Note that `contact` is never
    /// emitted by content extraction (phones and emails are stored under
    /// their own types), so bio contacts only ever match rows written by
    /// an index that used a merged contact type.
    #[must_use]
    pub const fn content_counterpart(self) -> &'static str {
        match self {
            Self::Url | Self::BioUrl => "url",
            Self::TgUsername => "tg_username",
            Self::TgLink | Self::BioTgLink => "tg_link",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::BioContact => "contact",
        }
    }

    /// Human-readable name for user-facing messages.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Url | Self::BioUrl => "URL",
            Self::TgUsername => "Telegram username",
            Self::TgLink | Self::BioTgLink => "Telegram link",
            Self::Phone => "phone number",
            Self::Email => "email address",
            Self::BioContact => "contact",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation status of a stored fingerprint.
///
/// Only `Approved` fingerprints participate in detection; pending and
/// rejected records are kept out of the corpus so spam signatures cannot
/// poison it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintStatus {
    /// Awaiting moderation.
    Pending,
    /// Published; participates in future checks.
    Approved,
    /// Rejected by moderation.
    Rejected,
}

impl FingerprintStatus {
    /// The stable string stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for FingerprintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FingerprintStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown fingerprint status '{other}'"
            ))),
        }
    }
}

/// Identity signals and content fingerprint derived from one submission.
///
/// Immutable once created. All list fields hold unique, normalized values
/// (case-folded, trailing punctuation stripped); order carries no meaning.
/// `content_hash` is a pure function of the normalized content tokens and
/// never depends on `user_id` or time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionFingerprint {
    /// Submitting user's id.
    pub user_id: i64,

    /// Submitting user's handle (may be empty).
    pub username: String,

    /// URLs extracted from content.
    pub urls: Vec<String>,

    /// Telegram usernames extracted from content.
    pub tg_usernames: Vec<String>,

    /// Telegram links extracted from content.
    pub tg_links: Vec<String>,

    /// Phone numbers extracted from content.
    pub phone_numbers: Vec<String>,

    /// Email addresses extracted from content.
    pub emails: Vec<String>,

    /// 64-bit SimHash as 16 lowercase hex chars, a raw digest for
    /// token-free content, or empty for empty content.
    pub content_hash: String,

    /// URLs extracted from the profile signature.
    pub bio_urls: Vec<String>,

    /// Telegram links and usernames from the profile signature.
    pub bio_tg_links: Vec<String>,

    /// WeChat/QQ/phone/email contacts from the profile signature.
    pub bio_contacts: Vec<String>,

    /// Submission time, seconds since the Unix epoch.
    pub submit_time: i64,

    /// Character count of the original content.
    pub content_length: usize,

    /// Extraction rules version, see [`FINGERPRINT_VERSION`].
    pub fingerprint_version: i32,
}

impl SubmissionFingerprint {
    /// Expands the fingerprint into `(kind, value)` pairs for the feature
    /// index, content-namespace kinds first, then bio-namespace kinds.
    #[must_use]
    pub fn all_features(&self) -> Vec<(FeatureKind, &str)> {
        let mut features = Vec::new();
        for url in &self.urls {
            features.push((FeatureKind::Url, url.as_str()));
        }
        for tg_user in &self.tg_usernames {
            features.push((FeatureKind::TgUsername, tg_user.as_str()));
        }
        for tg_link in &self.tg_links {
            features.push((FeatureKind::TgLink, tg_link.as_str()));
        }
        for phone in &self.phone_numbers {
            features.push((FeatureKind::Phone, phone.as_str()));
        }
        for email in &self.emails {
            features.push((FeatureKind::Email, email.as_str()));
        }
        for url in &self.bio_urls {
            features.push((FeatureKind::BioUrl, url.as_str()));
        }
        for tg_link in &self.bio_tg_links {
            features.push((FeatureKind::BioTgLink, tg_link.as_str()));
        }
        for contact in &self.bio_contacts {
            features.push((FeatureKind::BioContact, contact.as_str()));
        }
        features
    }

    /// Bio-namespace features only, for the related-by-signature stage.
    #[must_use]
    pub fn bio_features(&self) -> Vec<(FeatureKind, &str)> {
        let mut features = Vec::new();
        for url in &self.bio_urls {
            features.push((FeatureKind::BioUrl, url.as_str()));
        }
        for tg_link in &self.bio_tg_links {
            features.push((FeatureKind::BioTgLink, tg_link.as_str()));
        }
        for contact in &self.bio_contacts {
            features.push((FeatureKind::BioContact, contact.as_str()));
        }
        features
    }
}
