//! Verdict engine: ordered reduction of status tokens to an outcome.
//!
//! The checks below run in a fixed sequence and the first match wins.
//! Disqualifying conditions (expiry, revocation, bad signature, missing
//! key) come strictly before the structural completeness checks
//! (`VALIDSIG`, `GOODSIG`, `SIG_ID`), so a fingerprint is only trusted
//! once nothing has ruled the signature out. Reordering these checks is a
//! security-relevant behavior change, not a refactor.

use tracing::debug;

use super::error::VerifyError;
use super::launcher::RawProcessOutput;
use super::status::{
    ParsedStatus, BADARMOR, BADSIG, ERRSIG, GOODSIG, KEYREVOKED, KNOWN_KEYWORDS, NODATA,
    NO_PUBKEY, REVKEYSIG, SIGEXPIRED, SIG_ID, UNKNOWN_KEY_ID, VALIDSIG,
};
use super::Verified;

/// Prefix each line of verifier output for embedding in an error message.
fn prefix_lines(text: &str) -> String {
    text.lines()
        .map(|line| format!("gpgv: {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce the parsed status plus the exit code to a single outcome.
///
/// # Errors
///
/// Returns the specific [`VerifyError`] for the first matching rule; see
/// the module docs for why the order is load-bearing.
pub(crate) fn decide(
    parsed: &ParsedStatus,
    raw: &RawProcessOutput,
    filename: &str,
) -> Result<Verified, VerifyError> {
    if parsed.contains(SIGEXPIRED) {
        return Err(VerifyError::SignatureExpired);
    }
    if parsed.contains(KEYREVOKED) || parsed.contains(REVKEYSIG) {
        return Err(VerifyError::KeyRevoked);
    }
    if parsed.contains(BADSIG) {
        return Err(VerifyError::BadSignature);
    }
    if parsed.contains(NO_PUBKEY) {
        let key_id = parsed
            .args(NO_PUBKEY)
            .and_then(<[String]>::first)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_KEY_ID.to_string());
        return Err(VerifyError::NoPublicKey { key_id });
    }
    // NO_PUBKEY returned above, so an ERRSIG reaching this point has no
    // missing-key explanation.
    if parsed.contains(ERRSIG) {
        return Err(VerifyError::SignatureCheck);
    }
    if parsed.contains(BADARMOR) {
        return Err(VerifyError::BadArmor);
    }
    if parsed.contains(NODATA) {
        return Err(VerifyError::NoSignatureFound);
    }

    if raw.exit_code != 0 {
        let text = if raw.status.is_empty() {
            String::from_utf8_lossy(&raw.output)
        } else {
            String::from_utf8_lossy(&raw.status)
        };
        return Err(VerifyError::Failed {
            output: format!(
                "gpgv exited with code {} verifying {}:\n{}",
                raw.exit_code,
                filename,
                prefix_lines(&text)
            ),
        });
    }

    let fingerprint = match parsed.args(VALIDSIG) {
        None => return Err(VerifyError::NoValidSignature),
        Some(args) => match args.first() {
            None => {
                return Err(VerifyError::Failed {
                    output: format!("VALIDSIG carried no fingerprint verifying {filename}"),
                })
            }
            Some(fingerprint) => fingerprint.clone(),
        },
    };
    if !parsed.contains(GOODSIG) {
        return Err(VerifyError::NoGoodSignature);
    }
    if !parsed.contains(SIG_ID) {
        return Err(VerifyError::NoSignatureId);
    }

    for (keyword, args) in parsed.iter() {
        if !KNOWN_KEYWORDS.contains(&keyword) {
            return Err(VerifyError::UnknownToken {
                keyword: keyword.to_string(),
                args: args.to_vec(),
            });
        }
    }

    debug!(%fingerprint, "signature verified");
    Ok(Verified { fingerprint })
}
