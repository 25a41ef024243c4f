//! Duplicate detection pipeline.
//!
//! Four stages, evaluated in fixed priority order with short-circuit return
//! on the first hit: rate limit, exact match, fuzzy (SimHash), related by
//! profile signature. The ordering is a contract, not an implementation
//! detail: it decides which message the submitter sees.

mod exact;
mod fuzzy;
mod rate_limit;
mod related;
mod service;

pub use service::DuplicateDetector;
