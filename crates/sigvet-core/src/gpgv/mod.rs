//! The gpgv-backed verification engine.
//!
//! One call to [`Verifier::verify`] runs the whole pipeline:
//!
//! ```text
//! caller --> filename guard --> launcher --> multiplexer --> status parser --> verdict engine
//! ```
//!
//! The engine holds no state between calls. Each verification owns its
//! child process and its pipes exclusively, so concurrent calls need no
//! coordination; every descriptor is closed and the child reaped before
//! the call returns, on success and on every error path.
//!
//! # Trust model
//!
//! The verifier binary is only semi-trusted: its status output is parsed
//! fail-closed ([`status`]), its exit code alone is never believed to
//! mean "good signature", and file names are refused outright when they
//! could be misread on a command line ([`VerifyError::TaintedFileName`]).

mod error;
mod filename;
mod launcher;
pub mod status;
mod verdict;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

pub use error::VerifyError;
pub use status::{ParsedStatus, KNOWN_KEYWORDS};

/// Default verifier program, resolved via `PATH`.
pub const DEFAULT_PROGRAM: &str = "gpgv";

/// Default bound on one verification, spawn to reap.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One signature to verify: the signed file, the keyrings to trust, and
/// optionally a detached signature file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    filename: PathBuf,
    keyrings: Vec<PathBuf>,
    detached_signature: Option<PathBuf>,
}

impl VerificationRequest {
    /// A request to verify `filename` against an embedded signature.
    #[must_use]
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            keyrings: Vec::new(),
            detached_signature: None,
        }
    }

    /// Add a keyring; keyrings are passed to the verifier in the order
    /// they were added.
    #[must_use]
    pub fn with_keyring(mut self, keyring: impl Into<PathBuf>) -> Self {
        self.keyrings.push(keyring.into());
        self
    }

    /// Verify against a detached signature file instead of an embedded
    /// signature.
    #[must_use]
    pub fn with_detached_signature(mut self, signature: impl Into<PathBuf>) -> Self {
        self.detached_signature = Some(signature.into());
        self
    }

    /// The file whose signature is checked.
    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// The keyrings, in the order they will reach the verifier.
    #[must_use]
    pub fn keyrings(&self) -> &[PathBuf] {
        &self.keyrings
    }

    /// The detached signature file, if any.
    #[must_use]
    pub fn detached_signature(&self) -> Option<&Path> {
        self.detached_signature.as_deref()
    }
}

/// A successful verification: the fingerprint of the signing key, taken
/// from the verifier's `VALIDSIG` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// The verified key fingerprint.
    pub fingerprint: String,
}

/// Verifier configuration: which binary to run and how long to wait.
///
/// ```no_run
/// use std::time::Duration;
/// use sigvet_core::gpgv::{VerificationRequest, Verifier};
///
/// let verifier = Verifier::new()
///     .with_program("/usr/bin/gpgv")
///     .with_timeout(Duration::from_secs(10));
/// let outcome = verifier.verify(&VerificationRequest::new("data.asc").with_keyring("ring.gpg"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier {
    program: PathBuf,
    timeout: Duration,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    /// A verifier running [`DEFAULT_PROGRAM`] with [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a specific verifier binary instead of resolving `gpgv` via
    /// `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Bound one verification (spawn to reap) by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Verify one request, returning the signing key's fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::TaintedFileName`] before anything is
    /// spawned when a file name fails the guard, [`VerifyError::Internal`]
    /// or [`VerifyError::Timeout`] when the verifier cannot be run to
    /// completion, and the specific verification-failure variant
    /// otherwise; see [`VerifyError`].
    pub fn verify(&self, request: &VerificationRequest) -> Result<Verified, VerifyError> {
        // Security boundary: runs first, before any process exists.
        filename::check_file_name(&request.filename)?;
        if let Some(signature) = request.detached_signature() {
            filename::check_file_name(signature)?;
        }

        let process = launcher::launch(&self.program, request)?;
        let raw = process.drain(self.timeout)?;
        let parsed = status::parse(&raw.status)?;

        debug!(
            file = %request.filename().display(),
            tokens = parsed.len(),
            exit_code = raw.exit_code,
            "deciding verdict"
        );
        verdict::decide(&parsed, &raw, &request.filename().display().to_string())
    }
}

/// Verify `filename` with the default [`Verifier`].
///
/// Convenience wrapper over [`Verifier::verify`] for callers that do not
/// need to override the program or the timeout.
///
/// # Errors
///
/// Same as [`Verifier::verify`].
pub fn verify(
    filename: impl Into<PathBuf>,
    keyrings: &[PathBuf],
    detached_signature: Option<&Path>,
) -> Result<Verified, VerifyError> {
    let mut request = VerificationRequest::new(filename);
    for keyring in keyrings {
        request = request.with_keyring(keyring);
    }
    if let Some(signature) = detached_signature {
        request = request.with_detached_signature(signature);
    }
    Verifier::new().verify(&request)
}
