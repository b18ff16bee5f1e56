//! Fuzz harness for the gpgv status protocol parser.
//!
//! The status channel originates from an external, only semi-trusted
//! program, so the parser must never panic: every input, including
//! malformed Unicode, embedded NULs, and pathological whitespace, has to
//! come back as Ok or Err.

#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match sigvet_core::gpgv::status::parse(data) {
        Ok(parsed) => {
            // Whatever parsed must be internally consistent.
            for (keyword, args) in parsed.iter() {
                assert!(!keyword.is_empty());
                let _ = args;
            }
        }
        Err(err) => {
            // Diagnostics must render without panicking.
            let _ = err.to_string();
        }
    }
});
