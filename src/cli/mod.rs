//! CLI command implementations.
//!
//! Each command opens the fingerprint database, runs one detector or store
//! operation, and prints the outcome. The binary in `main.rs` owns argument
//! parsing and dispatch.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `check` | Run the detection pipeline against stored fingerprints |
//! | `record` | Extract and persist a submission fingerprint |
//! | `cleanup` | Delete fingerprints older than the retention window |
//! | `hash` | Print the SimHash of a text, optionally compare two |
//! | `status` | Show database statistics |

use std::path::Path;
use std::sync::Arc;

use crate::config::DetectorConfig;
use crate::detector::DuplicateDetector;
use crate::extract::{FeatureExtractor, MAX_DISTANCE, compute_content_hash, simhash_distance};
use crate::models::{FingerprintStatus, SubmissionFingerprint};
use crate::storage::{FingerprintStore, SqliteStore};
use crate::{Error, Result, current_timestamp};

/// Identity and content of one submission, as passed on the command line.
#[derive(Debug)]
pub struct SubmissionArgs {
    /// Submitting user's id.
    pub user_id: i64,
    /// Submitting user's handle.
    pub username: String,
    /// Submission content.
    pub content: String,
    /// Profile signature, when available.
    pub bio: Option<String>,
}

fn open_store(db_path: &Path) -> Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::new(db_path)?))
}

fn build_fingerprint(args: &SubmissionArgs) -> SubmissionFingerprint {
    FeatureExtractor::new().create_fingerprint(
        args.user_id,
        &args.username,
        &args.content,
        args.bio.as_deref(),
    )
}

fn to_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })
}

/// Runs the detection pipeline against the stored corpus and prints the
/// verdict. The fingerprint is not persisted; follow up with `record` once
/// the submission is accepted.
///
/// # Errors
///
/// Returns an error when the database cannot be opened or the configuration
/// is invalid.
pub fn cmd_check(db_path: &Path, args: &SubmissionArgs, json: bool) -> Result<()> {
    // The CLI exists to inspect detection, so an operator running `check`
    // always means "enabled".
    let config = DetectorConfig::from_env().with_enabled(true);
    let store = open_store(db_path)?;
    let detector = DuplicateDetector::new(store, config)?;

    let fingerprint = build_fingerprint(args);
    let verdict = detector.check(&fingerprint);

    if json {
        println!("{}", to_json(&verdict)?);
        return Ok(());
    }

    if verdict.is_duplicate {
        let kind = verdict
            .kind
            .map_or_else(|| "unknown".to_string(), |k| k.to_string());
        println!("duplicate ({kind}): {}", verdict.message);
        for (feature_type, feature_value) in &verdict.matched_features {
            println!("  {feature_type}: {feature_value}");
        }
    } else {
        println!("unique");
    }
    if verdict.degraded {
        println!("warning: check degraded, some stages were skipped");
    }
    Ok(())
}

/// Extracts a fingerprint and persists it.
///
/// Unlike the detector's save path this surfaces storage failures: an
/// operator explicitly recording a fingerprint wants to know it landed.
///
/// # Errors
///
/// Returns an error when the status string is unknown or the insert fails.
pub fn cmd_record(
    db_path: &Path,
    args: &SubmissionArgs,
    status: &str,
    submission_id: Option<i64>,
) -> Result<()> {
    let status: FingerprintStatus = status.parse()?;
    let store = open_store(db_path)?;

    let fingerprint = build_fingerprint(args);
    let id = store.insert_fingerprint(&fingerprint, status, submission_id)?;
    println!(
        "recorded fingerprint {id} for user {} ({} features, hash {})",
        args.user_id,
        fingerprint.all_features().len(),
        if fingerprint.content_hash.is_empty() {
            "<empty>"
        } else {
            &fingerprint.content_hash
        }
    );
    Ok(())
}

/// Deletes fingerprints older than the retention window and prints the
/// count removed.
///
/// # Errors
///
/// Returns an error when the database cannot be opened or the delete fails.
pub fn cmd_cleanup(db_path: &Path) -> Result<()> {
    let config = DetectorConfig::from_env();
    let store = open_store(db_path)?;

    let cutoff = current_timestamp() - config.window_seconds();
    let deleted = store.delete_fingerprints_before(cutoff)?;
    println!("deleted {deleted} expired fingerprints (older than {} days)", config.window_days);
    Ok(())
}

/// Prints the SimHash of `text`, and the distance/similarity against a
/// second text when given.
///
/// # Errors
///
/// Never fails; the signature matches the other commands for uniform
/// dispatch.
#[allow(clippy::unnecessary_wraps)]
pub fn cmd_hash(text: &str, against: Option<&str>) -> Result<()> {
    let hash = compute_content_hash(text);
    println!("{hash}");

    if let Some(other) = against {
        let other_hash = compute_content_hash(other);
        let distance = simhash_distance(&hash, &other_hash);
        let similarity = 1.0 - f64::from(distance) / f64::from(MAX_DISTANCE);
        println!("{other_hash}");
        println!("distance: {distance}, similarity: {similarity:.2}");
    }
    Ok(())
}

/// Shows database statistics.
///
/// # Errors
///
/// Returns an error when the database cannot be opened or queried.
pub fn cmd_status(db_path: &Path) -> Result<()> {
    let store = open_store(db_path)?;
    let config = DetectorConfig::from_env();

    println!("database: {}", db_path.display());
    println!("fingerprints: {}", store.fingerprint_count()?);
    println!("indexed features: {}", store.feature_count()?);
    println!(
        "detection: {} (window {} days, threshold {:.2})",
        if config.enabled { "enabled" } else { "disabled" },
        config.window_days,
        config.similarity_threshold
    );
    Ok(())
}
