//! Error types for gpgv-backed signature verification.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while verifying a signature.
///
/// The variants fall into three categories, mirroring how callers want to
/// react to them:
///
/// - **Pre-flight rejection**: [`TaintedFileName`](Self::TaintedFileName).
///   The input never reached the verifier.
/// - **Environment/protocol breakage**: [`Internal`](Self::Internal),
///   [`Timeout`](Self::Timeout), [`UnknownToken`](Self::UnknownToken).
///   Something is wrong with the installation or the status protocol, not
///   with the signature being checked. See [`is_internal`](Self::is_internal).
/// - **Verification failure**: every remaining variant. The verifier ran
///   and the signature could not be established as good. See
///   [`is_verification_failure`](Self::is_verification_failure).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// An input filename contains characters outside the allowed set.
    ///
    /// Detected before any process is spawned; the allowed set is
    /// `[A-Za-z0-9_.+~-]`, applied to the base name only.
    #[error("file name contains characters unsafe for the verifier command line: {name}")]
    TaintedFileName {
        /// The offending file name.
        name: String,
    },

    /// Installation- or protocol-level failure.
    ///
    /// Raised when the verifier cannot be spawned, its pipes cannot be
    /// set up, or its status channel violates the expected line protocol.
    /// Indicates a broken environment, never a bad signature.
    #[error("gpgv invocation failed: {detail}")]
    Internal {
        /// What went wrong.
        detail: String,
    },

    /// The verifier did not complete within the configured deadline.
    ///
    /// The child has been killed and reaped before this is returned.
    #[error("gpgv did not complete within {}s", limit.as_secs())]
    Timeout {
        /// The deadline that was exceeded.
        limit: Duration,
    },

    /// The signature has expired (`SIGEXPIRED`).
    #[error("the signature has expired")]
    SignatureExpired,

    /// The signing key has been revoked (`KEYREVOKED` or `REVKEYSIG`).
    #[error("the signing key has been revoked")]
    KeyRevoked,

    /// The signature does not match the data (`BADSIG`).
    #[error("the signature is bad")]
    BadSignature,

    /// The public key needed to check the signature is not in any of the
    /// supplied keyrings (`NO_PUBKEY`).
    #[error("no public key available for key id {key_id}")]
    NoPublicKey {
        /// The unresolved key id, or `UNKNOWN` when gpgv did not report one.
        key_id: String,
    },

    /// The signature could not be checked at all (`ERRSIG` without an
    /// accompanying `NO_PUBKEY`).
    #[error("the signature could not be checked")]
    SignatureCheck,

    /// The ASCII armor wrapping the signature is corrupt (`BADARMOR`).
    #[error("the signature armor is corrupt")]
    BadArmor,

    /// No signature data was found in the input (`NODATA`).
    #[error("no signature found")]
    NoSignatureFound,

    /// The verifier reported no `VALIDSIG` token.
    #[error("no valid signature reported")]
    NoValidSignature,

    /// The verifier reported no `GOODSIG` token.
    #[error("no good signature reported")]
    NoGoodSignature,

    /// The verifier reported no `SIG_ID` token.
    #[error("no signature id reported")]
    NoSignatureId,

    /// The status channel carried a keyword outside the known set.
    #[error("unknown status token {keyword} (args: {args:?})")]
    UnknownToken {
        /// The unrecognized keyword.
        keyword: String,
        /// The arguments that accompanied it.
        args: Vec<String>,
    },

    /// Verification failed without a more specific diagnosis: a nonzero
    /// exit code, or a `VALIDSIG` token carrying no fingerprint.
    #[error("signature verification failed:\n{output}")]
    Failed {
        /// Diagnostic text captured from the verifier.
        output: String,
    },
}

impl VerifyError {
    /// Stable snake_case label for this error, for reports and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TaintedFileName { .. } => "tainted_file_name",
            Self::Internal { .. } => "internal",
            Self::Timeout { .. } => "timeout",
            Self::SignatureExpired => "signature_expired",
            Self::KeyRevoked => "key_revoked",
            Self::BadSignature => "bad_signature",
            Self::NoPublicKey { .. } => "no_public_key",
            Self::SignatureCheck => "signature_check",
            Self::BadArmor => "bad_armor",
            Self::NoSignatureFound => "no_signature_found",
            Self::NoValidSignature => "no_valid_signature",
            Self::NoGoodSignature => "no_good_signature",
            Self::NoSignatureId => "no_signature_id",
            Self::UnknownToken { .. } => "unknown_token",
            Self::Failed { .. } => "failed",
        }
    }

    /// True when the verifier ran and the signature could not be
    /// established as good.
    ///
    /// This is the generic "any verification problem" category; callers
    /// that do not care which specific check failed can match on it.
    #[must_use]
    pub const fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureExpired
                | Self::KeyRevoked
                | Self::BadSignature
                | Self::NoPublicKey { .. }
                | Self::SignatureCheck
                | Self::BadArmor
                | Self::NoSignatureFound
                | Self::NoValidSignature
                | Self::NoGoodSignature
                | Self::NoSignatureId
                | Self::Failed { .. }
        )
    }

    /// True when the failure indicates a broken environment or a status
    /// protocol violation rather than a bad signature.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Internal { .. } | Self::Timeout { .. } | Self::UnknownToken { .. }
        )
    }
}
