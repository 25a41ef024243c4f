//! Feature extraction: text → identity signals + content fingerprint.
//!
//! Everything in this module is pure and side-effect free. The extractor
//! turns raw submission text into categorized signals (URLs, Telegram
//! handles, phones, emails, WeChat/QQ ids) and a 64-bit SimHash content
//! fingerprint; both feed the [`crate::DuplicateDetector`] pipeline.

mod features;
mod simhash;

pub use features::{ExtractedFeatures, FeatureExtractor};
pub use simhash::{MAX_DISTANCE, compute_content_hash, simhash_distance};
