//! Signature verification by delegation to an external `gpgv` binary.
//!
//! This crate does no cryptography of its own. It spawns the GnuPG
//! verification-only program (`gpgv`), captures its merged stdout/stderr
//! alongside a dedicated machine-readable status channel, parses the
//! line-oriented status protocol, and reduces the parsed tokens plus the
//! exit code into either a verified key fingerprint or a typed
//! verification error.
//!
//! # Example
//!
//! ```no_run
//! use sigvet_core::gpgv::{VerificationRequest, Verifier};
//!
//! let request = VerificationRequest::new("release.tar.gz")
//!     .with_keyring("trusted.gpg")
//!     .with_detached_signature("release.tar.gz.sig");
//!
//! match Verifier::new().verify(&request) {
//!     Ok(verified) => println!("good signature from {}", verified.fingerprint),
//!     Err(err) => eprintln!("verification failed: {err}"),
//! }
//! ```

pub mod gpgv;

pub use gpgv::{verify, VerificationRequest, Verified, Verifier, VerifyError};
