//! Identity-signal extraction from free text.

use crate::models::{FINGERPRINT_VERSION, SubmissionFingerprint};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::simhash::compute_content_hash;

// Extraction patterns. These are part of the fingerprint-version contract:
// loosening or tightening any of them changes what older records can match,
// so FINGERPRINT_VERSION must be bumped alongside.

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+"#).expect("static regex: url pattern")
});

static TG_USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([a-zA-Z][a-zA-Z0-9_]{4,31})").expect("static regex: tg username pattern")
});

static TG_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:t\.me|telegram\.me)/([a-zA-Z0-9_+]+)")
        .expect("static regex: tg link pattern")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?[0-9]{1,4}[-.\s]?)?(?:\(?[0-9]{2,4}\)?[-.\s]?)?[0-9]{3,4}[-.\s]?[0-9]{3,4}")
        .expect("static regex: phone pattern")
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
        .expect("static regex: email pattern")
});

static WECHAT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:微信|wx|WeChat)[：:\s]*([a-zA-Z0-9_-]+)")
        .expect("static regex: wechat pattern")
});

static QQ_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)qq[：:\s]*([0-9]{5,12})").expect("static regex: qq pattern"));

/// Hosts and path prefixes that never identify a submitter: platform
/// self-links and search-engine query URLs.
const URL_DENYLIST: [&str; 5] = [
    "telegram.org",
    "t.me/addstickers",
    "t.me/setlanguage",
    "google.com/search",
    "bing.com/search",
];

/// Trailing punctuation stripped from matched URLs.
const URL_TRAILING_PUNCT: [char; 6] = ['.', ',', ';', ':', '!', '?'];

/// Signals extracted from one text, one field per category.
///
/// Every list holds unique, normalized (lowercased) values in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFeatures {
    /// HTTP(S) URLs, denylist-filtered.
    pub urls: Vec<String>,
    /// Telegram `@handle` usernames.
    pub tg_usernames: Vec<String>,
    /// Handles from `t.me/...` / `telegram.me/...` links.
    pub tg_links: Vec<String>,
    /// Phone numbers, digits and leading `+` only.
    pub phone_numbers: Vec<String>,
    /// Email addresses.
    pub emails: Vec<String>,
    /// WeChat ids (keyword-prefixed).
    pub wechat: Vec<String>,
    /// QQ numbers (keyword-prefixed).
    pub qq: Vec<String>,
}

/// Stateless text → signals extractor.
///
/// Construct one at service startup and pass it by reference; there is no
/// hidden shared state and extraction is idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts every feature category from `text`.
    ///
    /// Empty input returns all-empty result sets; this is not an error.
    #[must_use]
    pub fn extract_all(&self, text: &str) -> ExtractedFeatures {
        if text.is_empty() {
            return ExtractedFeatures::default();
        }

        ExtractedFeatures {
            urls: Self::extract_urls(text),
            tg_usernames: Self::extract_captures_lowercase(&TG_USERNAME_REGEX, text),
            tg_links: Self::extract_captures_lowercase(&TG_LINK_REGEX, text),
            phone_numbers: Self::extract_phones(text),
            emails: Self::extract_matches_lowercase(&EMAIL_REGEX, text),
            wechat: Self::extract_captures_lowercase(&WECHAT_REGEX, text),
            qq: Self::extract_captures_lowercase(&QQ_REGEX, text),
        }
    }

    fn extract_urls(text: &str) -> Vec<String> {
        let mut urls = BTreeSet::new();
        for m in URL_REGEX.find_iter(text) {
            let mut url = m.as_str().to_lowercase();
            // strip trailing punctuation, including a closing paren
            url.truncate(
                url.trim_end_matches(|c| URL_TRAILING_PUNCT.contains(&c) || c == ')')
                    .len(),
            );
            if url.is_empty() {
                continue;
            }
            if URL_DENYLIST.iter().any(|blocked| url.contains(blocked)) {
                continue;
            }
            urls.insert(url);
        }
        urls.into_iter().collect()
    }

    fn extract_phones(text: &str) -> Vec<String> {
        let mut phones = BTreeSet::new();
        for m in PHONE_REGEX.find_iter(text) {
            let normalized: String = m
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '+')
                .collect();
            let digit_count = normalized.chars().filter(char::is_ascii_digit).count();
            if digit_count >= 7 {
                phones.insert(normalized);
            }
        }
        phones.into_iter().collect()
    }

    fn extract_matches_lowercase(regex: &Regex, text: &str) -> Vec<String> {
        regex
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn extract_captures_lowercase(regex: &Regex, text: &str) -> Vec<String> {
        regex
            .captures_iter(text)
            .map(|cap| cap[1].to_lowercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Builds a [`SubmissionFingerprint`] from one submission.
    ///
    /// Runs extraction once on `content` and once on the optional profile
    /// `bio`. Bio-side WeChat/QQ/phone/email signals merge into a single
    /// `bio_contacts` set, and bio Telegram links and usernames merge into
    /// `bio_tg_links`; content-side features keep their own namespaces.
    #[must_use]
    pub fn create_fingerprint(
        &self,
        user_id: i64,
        username: &str,
        content: &str,
        bio: Option<&str>,
    ) -> SubmissionFingerprint {
        let content_features = self.extract_all(content);
        let bio_features = bio.map(|b| self.extract_all(b)).unwrap_or_default();

        let bio_tg_links: Vec<String> = bio_features
            .tg_links
            .iter()
            .chain(bio_features.tg_usernames.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let bio_contacts: Vec<String> = bio_features
            .wechat
            .iter()
            .chain(bio_features.qq.iter())
            .chain(bio_features.phone_numbers.iter())
            .chain(bio_features.emails.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let fingerprint = SubmissionFingerprint {
            user_id,
            username: username.to_string(),
            urls: content_features.urls,
            tg_usernames: content_features.tg_usernames,
            tg_links: content_features.tg_links,
            phone_numbers: content_features.phone_numbers,
            emails: content_features.emails,
            content_hash: compute_content_hash(content),
            bio_urls: bio_features.urls,
            bio_tg_links,
            bio_contacts,
            submit_time: crate::current_timestamp(),
            content_length: content.chars().count(),
            fingerprint_version: FINGERPRINT_VERSION,
        };

        tracing::debug!(
            user_id,
            urls = fingerprint.urls.len(),
            tg_links = fingerprint.tg_links.len(),
            content_hash = %fingerprint.content_hash,
            "built submission fingerprint"
        );

        fingerprint
    }
}
