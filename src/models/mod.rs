//! Domain models for the detection engine.

mod fingerprint;
mod verdict;

pub use fingerprint::{
    FINGERPRINT_VERSION, FeatureKind, FingerprintStatus, SubmissionFingerprint,
};
pub use verdict::{DuplicateKind, DuplicateVerdict};
