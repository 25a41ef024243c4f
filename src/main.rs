//! Binary entry point for dupgate.
//!
//! This binary provides a CLI around the duplicate detection engine: run
//! checks against a fingerprint database, record fingerprints, expire old
//! ones, and inspect SimHash values.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use dupgate::cli::{self, SubmissionArgs};
use dupgate::observability::{self, LoggingConfig};

/// Dupgate - duplicate-submission detection for moderated channels.
#[derive(Parser)]
#[command(name = "dupgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the fingerprint database.
    #[arg(long, global = true, env = "DUPGATE_DB_PATH", default_value = "fingerprints.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check a submission against the stored corpus.
    Check {
        /// Submitting user's id.
        #[arg(short, long)]
        user_id: i64,

        /// Submitting user's handle.
        #[arg(short = 'n', long, default_value = "")]
        username: String,

        /// Submission content.
        content: String,

        /// Profile signature text.
        #[arg(short, long)]
        bio: Option<String>,

        /// Print the verdict as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record a submission fingerprint.
    Record {
        /// Submitting user's id.
        #[arg(short, long)]
        user_id: i64,

        /// Submitting user's handle.
        #[arg(short = 'n', long, default_value = "")]
        username: String,

        /// Submission content.
        content: String,

        /// Profile signature text.
        #[arg(short, long)]
        bio: Option<String>,

        /// Moderation status: pending, approved, or rejected.
        #[arg(short, long, default_value = "approved")]
        status: String,

        /// Host-side submission id.
        #[arg(long)]
        submission_id: Option<i64>,
    },

    /// Delete fingerprints older than the retention window.
    Cleanup,

    /// Print the SimHash fingerprint of a text.
    Hash {
        /// Text to fingerprint.
        text: String,

        /// Second text to compare against.
        #[arg(long)]
        against: Option<String>,
    },

    /// Show database statistics.
    Status,
}

/// Main entry point.
fn main() -> ExitCode {
    // Pick up DUPGATE_* settings from a local .env when present
    dotenvy::dotenv().ok();

    let args = Cli::parse();

    if let Err(e) = observability::init(&LoggingConfig::from_env(args.verbose)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command.
fn run_command(args: Cli) -> dupgate::Result<()> {
    match args.command {
        Commands::Check {
            user_id,
            username,
            content,
            bio,
            json,
        } => cli::cmd_check(
            &args.db,
            &SubmissionArgs {
                user_id,
                username,
                content,
                bio,
            },
            json,
        ),

        Commands::Record {
            user_id,
            username,
            content,
            bio,
            status,
            submission_id,
        } => cli::cmd_record(
            &args.db,
            &SubmissionArgs {
                user_id,
                username,
                content,
                bio,
            },
            &status,
            submission_id,
        ),

        Commands::Cleanup => cli::cmd_cleanup(&args.db),

        Commands::Hash { text, against } => cli::cmd_hash(&text, against.as_deref()),

        Commands::Status => cli::cmd_status(&args.db),
    }
}
