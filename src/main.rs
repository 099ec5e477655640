//! `verify-pack` CLI.
//!
//! Validates a Git pack file and its index:
//!
//! ```text
//! verify-pack [-v|--verbose] [--sha256] [--max-object-bytes <BYTES>] <file>
//! ```
//!
//! `<file>` names either the `.idx` or the `.pack`; the other is found by
//! swapping the extension. Reports go to stdout, logs and errors to stderr.
//!
//! # Exit Codes
//!
//! - `0`: the pack verified
//! - `1`: verification failed
//! - `2`: invalid arguments
//!
//! # Logging
//!
//! `RUST_LOG` selects log filters. Without it, `GIT_TRACE=1` (or `true`)
//! enables debug logs; otherwise only warnings are shown.

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pack_verify::{verify_pack_to, DecodeLimits, ObjectFormat, VerifyOptions};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "verify-pack", version, about = "Validate packed Git archive files")]
struct Cli {
    /// Show per-object details and delta chain statistics
    #[arg(short, long)]
    verbose: bool,
    /// Treat the pack as using SHA-256 object IDs
    #[arg(long)]
    sha256: bool,
    /// Largest object or delta stream held in memory while resolving types
    #[arg(long, value_name = "BYTES")]
    max_object_bytes: Option<usize>,
    /// The `.idx` or `.pack` file to verify
    file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let options = VerifyOptions {
        verbose: cli.verbose,
        format: if cli.sha256 {
            ObjectFormat::Sha256
        } else {
            ObjectFormat::Sha1
        },
        limits: DecodeLimits {
            max_object_bytes: cli
                .max_object_bytes
                .unwrap_or(DecodeLimits::DEFAULT_MAX_OBJECT_BYTES),
            ..DecodeLimits::default()
        },
    };

    let mut out = BufWriter::new(io::stdout().lock());
    match verify_pack_to(&cli.file, &options, &mut out) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "verification failed");
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let git_trace = std::env::var("GIT_TRACE").unwrap_or_default();
        let level = if matches!(git_trace.as_str(), "1" | "true") {
            "debug"
        } else {
            "warn"
        };
        EnvFilter::new(format!("pack_verify={level},verify_pack={level}"))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
