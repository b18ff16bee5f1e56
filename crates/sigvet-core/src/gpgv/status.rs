//! Status channel protocol parser.
//!
//! gpgv reports machine-readable results on a dedicated file descriptor,
//! one event per line:
//!
//! ```text
//! [GNUPG:] KEYWORD [ARG ...]
//! ```
//!
//! Fields are separated by one or more whitespace characters and lines by
//! `\n`. The parser is fail-closed: every malformed line, wrong prefix,
//! and structurally invalid duplicate is collected, and a single
//! diagnostic covering the whole stream fails the parse. A partially
//! trusted parse is never handed to the verdict engine.

use std::collections::BTreeMap;

use super::error::VerifyError;

/// Literal prefix every status line must carry.
pub const STATUS_PREFIX: &str = "[GNUPG:]";

/// Sentinel key id reported when `NO_PUBKEY` carries no argument.
pub const UNKNOWN_KEY_ID: &str = "UNKNOWN";

pub const VALIDSIG: &str = "VALIDSIG";
pub const SIG_ID: &str = "SIG_ID";
pub const GOODSIG: &str = "GOODSIG";
pub const BADSIG: &str = "BADSIG";
pub const ERRSIG: &str = "ERRSIG";
pub const SIGEXPIRED: &str = "SIGEXPIRED";
pub const KEYREVOKED: &str = "KEYREVOKED";
pub const REVKEYSIG: &str = "REVKEYSIG";
pub const NO_PUBKEY: &str = "NO_PUBKEY";
pub const BADARMOR: &str = "BADARMOR";
pub const NODATA: &str = "NODATA";

/// Keywords the verdict engine accepts. Anything else on the status
/// channel invalidates the verification.
pub const KNOWN_KEYWORDS: &[&str] = &[
    VALIDSIG, SIG_ID, GOODSIG, BADSIG, ERRSIG, SIGEXPIRED, KEYREVOKED, REVKEYSIG, NO_PUBKEY,
    BADARMOR, NODATA,
];

/// Keywords gpgv may legitimately emit more than once.
const REPEATABLE_KEYWORDS: &[&str] = &[NODATA, SIGEXPIRED];

/// The decoded status channel: keyword to argument list.
///
/// Keys are unique after validation; for the repeatable keywords the last
/// occurrence's arguments win. Iteration order is deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedStatus {
    tokens: BTreeMap<String, Vec<String>>,
}

impl ParsedStatus {
    /// Whether `keyword` appeared on the status channel.
    #[must_use]
    pub fn contains(&self, keyword: &str) -> bool {
        self.tokens.contains_key(keyword)
    }

    /// The arguments of `keyword`, if it appeared.
    #[must_use]
    pub fn args(&self, keyword: &str) -> Option<&[String]> {
        self.tokens.get(keyword).map(Vec::as_slice)
    }

    /// All keywords with their arguments, in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tokens
            .iter()
            .map(|(keyword, args)| (keyword.as_str(), args.as_slice()))
    }

    /// Number of distinct keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the status channel carried no accepted token at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn insert(&mut self, keyword: &str, args: Vec<String>) {
        self.tokens.insert(keyword.to_string(), args);
    }
}

/// Decode the raw status channel bytes into a [`ParsedStatus`].
///
/// The input is decoded lossily as UTF-8. Blank lines are skipped after
/// trimming. Diagnostics from all offending lines are accumulated and
/// reported together, so one malformed line neither silently drops the
/// rest of the stream nor lets a verdict be drawn from it.
///
/// # Errors
///
/// Returns [`VerifyError::Internal`] carrying the accumulated diagnostic
/// when any line is malformed, carries the wrong prefix, or repeats a
/// non-repeatable keyword.
pub fn parse(status: &[u8]) -> Result<ParsedStatus, VerifyError> {
    let text = String::from_utf8_lossy(status);
    let mut parsed = ParsedStatus::default();
    let mut diagnostics: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            diagnostics.push(format!(
                "malformed status line (expected `{STATUS_PREFIX} KEYWORD [ARG ...]`): {line}"
            ));
            continue;
        }
        if fields[0] != STATUS_PREFIX {
            diagnostics.push(format!(
                "status line does not start with `{STATUS_PREFIX}`: {line}"
            ));
            continue;
        }
        let keyword = fields[1];
        if parsed.contains(keyword) && !REPEATABLE_KEYWORDS.contains(&keyword) {
            diagnostics.push(format!("duplicate status token: {keyword}"));
            continue;
        }
        let args = fields[2..].iter().map(ToString::to_string).collect();
        parsed.insert(keyword, args);
    }

    if diagnostics.is_empty() {
        Ok(parsed)
    } else {
        Err(VerifyError::Internal {
            detail: format!(
                "gpgv status channel violated the expected protocol:\n{}",
                diagnostics.join("\n")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keywords_and_args() {
        let parsed = parse(b"[GNUPG:] VALIDSIG ABCD1234 2026-01-01\n[GNUPG:] GOODSIG 1234 Tester\n")
            .expect("well-formed status");
        assert_eq!(
            parsed.args(VALIDSIG),
            Some(&["ABCD1234".to_string(), "2026-01-01".to_string()][..])
        );
        assert!(parsed.contains(GOODSIG));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn keyword_without_args_gets_empty_args() {
        let parsed = parse(b"[GNUPG:] GOODSIG\n").expect("well-formed status");
        assert_eq!(parsed.args(GOODSIG), Some(&[][..]));
    }

    #[test]
    fn tolerates_blank_lines_and_extra_whitespace() {
        let parsed = parse(b"\n  [GNUPG:]   GOODSIG   key   \n\n").expect("well-formed status");
        assert_eq!(
            parsed.args(GOODSIG),
            Some(&["key".to_string()][..])
        );
    }

    #[test]
    fn empty_input_parses_to_empty_status() {
        let parsed = parse(b"").expect("empty status is valid");
        assert!(parsed.is_empty());
    }

    #[test]
    fn single_field_line_fails() {
        let err = parse(b"[GNUPG:]\n").expect_err("one field is malformed");
        assert!(matches!(err, VerifyError::Internal { .. }));
        assert!(err.to_string().contains("malformed status line"));
    }

    #[test]
    fn wrong_prefix_fails() {
        let err = parse(b"[GPGME:] GOODSIG key\n").expect_err("wrong prefix");
        assert!(err.to_string().contains("does not start with"));
    }

    #[test]
    fn duplicate_keyword_fails() {
        let err = parse(b"[GNUPG:] GOODSIG a\n[GNUPG:] GOODSIG b\n")
            .expect_err("duplicate GOODSIG is a protocol error");
        assert!(err.to_string().contains("duplicate status token: GOODSIG"));
    }

    #[test]
    fn nodata_and_sigexpired_may_repeat() {
        let parsed = parse(
            b"[GNUPG:] NODATA 1\n[GNUPG:] NODATA 2\n[GNUPG:] SIGEXPIRED x\n[GNUPG:] SIGEXPIRED y\n",
        )
        .expect("repeatable keywords");
        // Last occurrence wins; presence is all the verdict engine reads.
        assert_eq!(parsed.args(NODATA), Some(&["2".to_string()][..]));
        assert_eq!(parsed.args(SIGEXPIRED), Some(&["y".to_string()][..]));
    }

    #[test]
    fn one_bad_line_fails_the_whole_stream() {
        let err = parse(b"[GNUPG:] GOODSIG key\nnoise\n[GNUPG:] SIG_ID abc\n")
            .expect_err("a single bad line must fail the parse");
        assert!(matches!(err, VerifyError::Internal { .. }));
    }

    #[test]
    fn all_diagnostics_are_accumulated() {
        let err = parse(b"[GNUPG:]\n[WRONG:] GOODSIG a\n[GNUPG:] NODATA\n[GNUPG:] BADSIG\n[GNUPG:] BADSIG\n")
            .expect_err("multiple protocol violations");
        let message = err.to_string();
        assert!(message.contains("malformed status line"));
        assert!(message.contains("does not start with"));
        assert!(message.contains("duplicate status token: BADSIG"));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let parsed = parse(b"[GNUPG:] GOODSIG \xff\n").expect("lossy decoding");
        assert!(parsed.contains(GOODSIG));
    }

    #[test]
    fn known_keyword_set_matches_the_protocol() {
        for keyword in [
            VALIDSIG, SIG_ID, GOODSIG, BADSIG, ERRSIG, SIGEXPIRED, KEYREVOKED, REVKEYSIG,
            NO_PUBKEY, BADARMOR, NODATA,
        ] {
            assert!(KNOWN_KEYWORDS.contains(&keyword), "{keyword}");
        }
        assert_eq!(KNOWN_KEYWORDS.len(), 11);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn never_panics_on_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..512)) {
                let _ = parse(&data);
            }

            #[test]
            fn well_formed_single_lines_round_trip(
                keyword in "[A-Z_]{2,12}",
                args in proptest::collection::vec("[a-zA-Z0-9]{1,8}", 0..4),
            ) {
                let line = format!("[GNUPG:] {keyword} {}\n", args.join(" "));
                let parsed = parse(line.as_bytes()).expect("well-formed line");
                prop_assert_eq!(parsed.args(&keyword), Some(args.as_slice()));
            }
        }
    }
}
