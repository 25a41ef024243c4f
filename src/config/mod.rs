//! Detector configuration.
//!
//! All knobs are hot-reloadable from the host's config system: the struct is
//! plain data, cheap to clone, and a new detector can be constructed from a
//! fresh copy at any time.

use crate::{Error, Result};

/// Configuration for the duplicate detector.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `DUPGATE_ENABLED` | bool | `false` | Enable duplicate checking |
/// | `DUPGATE_WINDOW_DAYS` | u32 | `7` | Detection/retention window in days |
/// | `DUPGATE_SIMILARITY_THRESHOLD` | f64 | `0.8` | Fuzzy-match similarity threshold |
/// | `DUPGATE_CHECK_URLS` | bool | `true` | Exact-match URLs |
/// | `DUPGATE_CHECK_CONTACTS` | bool | `true` | Exact-match phones/emails |
/// | `DUPGATE_CHECK_TG_LINKS` | bool | `true` | Exact-match TG links/usernames |
/// | `DUPGATE_CHECK_USER_BIO` | bool | `true` | Related-by-signature stage |
/// | `DUPGATE_CHECK_CONTENT_HASH` | bool | `true` | Fuzzy SimHash stage |
/// | `DUPGATE_RATE_LIMIT_ENABLED` | bool | `true` | Per-user rate limiting |
/// | `DUPGATE_RATE_LIMIT_COUNT` | u32 | `3` | Approved submissions per window |
/// | `DUPGATE_RATE_LIMIT_WINDOW_HOURS` | u32 | `24` | Rate-limit window in hours |
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Enable/disable the entire detection pipeline.
    pub enabled: bool,

    /// Detection and retention window in days.
    pub window_days: u32,

    /// Fuzzy-match similarity threshold in `[0, 1]`.
    pub similarity_threshold: f64,

    /// Exact-match URLs extracted from content.
    pub check_urls: bool,

    /// Exact-match phone numbers and emails extracted from content.
    pub check_contacts: bool,

    /// Exact-match Telegram links and usernames extracted from content.
    pub check_tg_links: bool,

    /// Compare profile-signature features against the content index.
    pub check_user_bio: bool,

    /// SimHash fuzzy matching on content.
    pub check_content_hash: bool,

    /// Per-user rate limiting of approved submissions.
    pub rate_limit_enabled: bool,

    /// Maximum approved submissions per rate window.
    pub rate_limit_count: u32,

    /// Rate-limit window in hours.
    pub rate_limit_window_hours: u32,
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).map_or(default, |v| {
        matches!(v.to_lowercase().as_str(), "true" | "1" | "yes")
    })
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl DetectorConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Falls back to defaults for any unset or unparsable variable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            enabled: env_bool("DUPGATE_ENABLED", false),
            window_days: env_parse("DUPGATE_WINDOW_DAYS", 7),
            similarity_threshold: env_parse("DUPGATE_SIMILARITY_THRESHOLD", 0.8),
            check_urls: env_bool("DUPGATE_CHECK_URLS", true),
            check_contacts: env_bool("DUPGATE_CHECK_CONTACTS", true),
            check_tg_links: env_bool("DUPGATE_CHECK_TG_LINKS", true),
            check_user_bio: env_bool("DUPGATE_CHECK_USER_BIO", true),
            check_content_hash: env_bool("DUPGATE_CHECK_CONTENT_HASH", true),
            rate_limit_enabled: env_bool("DUPGATE_RATE_LIMIT_ENABLED", true),
            rate_limit_count: env_parse("DUPGATE_RATE_LIMIT_COUNT", 3),
            rate_limit_window_hours: env_parse("DUPGATE_RATE_LIMIT_WINDOW_HOURS", 24),
        }
    }

    /// Validates the configuration.
    ///
    /// Called once at detector construction so malformed values fail fast
    /// at startup instead of per-request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the similarity threshold is
    /// outside `[0, 1]` or any window/count is zero.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidConfig(format!(
                "similarity_threshold must be in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.window_days == 0 {
            return Err(Error::InvalidConfig(
                "window_days must be at least 1".to_string(),
            ));
        }
        if self.rate_limit_enabled && self.rate_limit_count == 0 {
            return Err(Error::InvalidConfig(
                "rate_limit_count must be at least 1".to_string(),
            ));
        }
        if self.rate_limit_enabled && self.rate_limit_window_hours == 0 {
            return Err(Error::InvalidConfig(
                "rate_limit_window_hours must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Detection window in seconds.
    #[must_use]
    pub const fn window_seconds(&self) -> i64 {
        self.window_days as i64 * 86_400
    }

    /// Rate-limit window in seconds.
    #[must_use]
    pub const fn rate_window_seconds(&self) -> i64 {
        self.rate_limit_window_hours as i64 * 3_600
    }

    /// Builder method to set enabled state.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to set the detection window.
    #[must_use]
    pub const fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    /// Builder method to set the fuzzy similarity threshold.
    #[must_use]
    pub const fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Builder method to enable/disable rate limiting.
    #[must_use]
    pub const fn with_rate_limit(mut self, enabled: bool, count: u32, window_hours: u32) -> Self {
        self.rate_limit_enabled = enabled;
        self.rate_limit_count = count;
        self.rate_limit_window_hours = window_hours;
        self
    }

    /// Builder method to enable/disable the bio (related) stage.
    #[must_use]
    pub const fn with_check_user_bio(mut self, enabled: bool) -> Self {
        self.check_user_bio = enabled;
        self
    }

    /// Builder method to enable/disable the fuzzy SimHash stage.
    #[must_use]
    pub const fn with_check_content_hash(mut self, enabled: bool) -> Self {
        self.check_content_hash = enabled;
        self
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_days: 7,
            similarity_threshold: 0.8,
            check_urls: true,
            check_contacts: true,
            check_tg_links: true,
            check_user_bio: true,
            check_content_hash: true,
            rate_limit_enabled: true,
            rate_limit_count: 3,
            rate_limit_window_hours: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.window_days, 7);
        assert!((config.similarity_threshold - 0.8).abs() < f64::EPSILON);
        assert!(config.check_urls);
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_count, 3);
        assert_eq!(config.rate_limit_window_hours, 24);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = DetectorConfig::default().with_similarity_threshold(1.5);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = DetectorConfig::default().with_similarity_threshold(-0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = DetectorConfig::default().with_window_days(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rate_limit() {
        let config = DetectorConfig::default().with_rate_limit(true, 0, 24);
        assert!(config.validate().is_err());

        // Zero values are fine when rate limiting is off
        let config = DetectorConfig::default().with_rate_limit(false, 0, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_conversions() {
        let config = DetectorConfig::default()
            .with_window_days(7)
            .with_rate_limit(true, 3, 24);
        assert_eq!(config.window_seconds(), 604_800);
        assert_eq!(config.rate_window_seconds(), 86_400);
    }

    #[test]
    fn test_builder_methods() {
        let config = DetectorConfig::default()
            .with_enabled(true)
            .with_window_days(14)
            .with_similarity_threshold(0.9)
            .with_check_user_bio(false)
            .with_check_content_hash(false)
            .with_rate_limit(false, 5, 12);

        assert!(config.enabled);
        assert_eq!(config.window_days, 14);
        assert!((config.similarity_threshold - 0.9).abs() < f64::EPSILON);
        assert!(!config.check_user_bio);
        assert!(!config.check_content_hash);
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.rate_limit_count, 5);
    }
}
