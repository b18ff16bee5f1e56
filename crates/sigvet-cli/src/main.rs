//! sigvet - verify a file's GPG signature via an external gpgv.
//!
//! Exit codes: 0 when the signature verifies, 1 on a verification
//! failure (bad/expired/revoked/unknown-key signature and friends), 2 on
//! an environment problem (tainted file name, spawn failure, protocol
//! violation, timeout).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use sigvet_core::gpgv::{VerificationRequest, Verified, Verifier, VerifyError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// sigvet - verify a file's GPG signature via gpgv
#[derive(Parser, Debug)]
#[command(name = "sigvet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// File whose signature to verify
    file: PathBuf,

    /// Keyring to trust (repeatable, order preserved)
    #[arg(long = "keyring", value_name = "PATH")]
    keyrings: Vec<PathBuf>,

    /// Detached signature file
    #[arg(long, value_name = "PATH")]
    signature: Option<PathBuf>,

    /// Path to the gpgv binary
    #[arg(long, value_name = "PATH", default_value = "gpgv")]
    gpgv: PathBuf,

    /// Verification timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Emit the result as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Report {
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Report {
    fn from_outcome(outcome: &Result<Verified, VerifyError>) -> Self {
        match outcome {
            Ok(verified) => Self {
                verified: true,
                fingerprint: Some(verified.fingerprint.clone()),
                error_kind: None,
                message: None,
            },
            Err(err) => Self {
                verified: false,
                fingerprint: None,
                error_kind: Some(err.kind()),
                message: Some(err.to_string()),
            },
        }
    }
}

fn exit_code_for(outcome: &Result<Verified, VerifyError>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(err) if err.is_verification_failure() => 1,
        Err(_) => 2,
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let verifier = Verifier::new()
        .with_program(cli.gpgv.clone())
        .with_timeout(Duration::from_secs(cli.timeout_secs));

    let mut request = VerificationRequest::new(cli.file.clone());
    for keyring in &cli.keyrings {
        request = request.with_keyring(keyring);
    }
    if let Some(signature) = &cli.signature {
        request = request.with_detached_signature(signature);
    }

    let outcome = verifier.verify(&request);

    if cli.json {
        let report = Report::from_outcome(&outcome);
        let rendered =
            serde_json::to_string_pretty(&report).context("serializing verification report")?;
        println!("{rendered}");
    } else {
        match &outcome {
            Ok(verified) => println!("good signature, fingerprint {}", verified.fingerprint),
            Err(err) => eprintln!("verification failed: {err}"),
        }
    }

    Ok(ExitCode::from(exit_code_for(&outcome)))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    run(&cli)
}
