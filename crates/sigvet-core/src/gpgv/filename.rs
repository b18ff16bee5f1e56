//! File name safety guard.
//!
//! File names end up on the verifier's command line, so they are checked
//! against a strict allowlist before any process is spawned. This is a
//! security boundary: a name that fails here aborts the whole
//! verification, and nothing is ever escaped or rewritten to make it
//! pass. Only the base name is inspected so that directory components
//! cannot smuggle shell metacharacters past the check.

use std::ffi::OsStr;
use std::path::Path;

use super::error::VerifyError;

/// Characters allowed in a file name handed to the verifier.
const fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | '-' | '_')
}

/// Check that the base name of `path` contains only allowed characters.
///
/// Paths with no base name (`..`, `/`) and base names that are not valid
/// UTF-8 are rejected outright.
///
/// # Errors
///
/// Returns [`VerifyError::TaintedFileName`] when any character falls
/// outside `[A-Za-z0-9_.+~-]`.
pub(crate) fn check_file_name(path: &Path) -> Result<(), VerifyError> {
    let Some(name) = path.file_name().and_then(OsStr::to_str) else {
        return Err(VerifyError::TaintedFileName {
            name: path.display().to_string(),
        });
    };
    if name.is_empty() || !name.chars().all(is_allowed_char) {
        return Err(VerifyError::TaintedFileName {
            name: name.to_string(),
        });
    }
    Ok(())
}
