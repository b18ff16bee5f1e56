//! Descriptor and child-process hygiene across every outcome.
//!
//! Kept in its own test binary so the descriptor census is not disturbed
//! by unrelated tests running on sibling threads.

#![cfg(target_os = "linux")]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sigvet_core::gpgv::{VerificationRequest, Verifier, VerifyError};
use tempfile::TempDir;

fn open_fd_count() -> usize {
    fs::read_dir("/proc/self/fd").expect("read /proc/self/fd").count()
}

fn write_stub(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("gpgv-stub");
    fs::write(&path, body).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}

#[test]
fn no_descriptor_leaks_on_any_outcome() {
    let dir = TempDir::new().expect("tempdir");
    let status_file = dir.path().join("status.txt");
    fs::write(
        &status_file,
        "[GNUPG:] VALIDSIG ABCD1234\n[GNUPG:] GOODSIG k\n[GNUPG:] SIG_ID s\n",
    )
    .expect("write status text");

    let good = write_stub(
        dir.path(),
        &format!(
            "#!/bin/sh\nfd=\"\"\nprev=\"\"\nfor arg in \"$@\"; do\n  if [ \"$prev\" = \"--status-fd\" ]; then fd=\"$arg\"; fi\n  prev=\"$arg\"\ndone\ncat '{}' > \"/proc/self/fd/$fd\"\nexit 0\n",
            status_file.display()
        ),
    );
    let failing = dir.path().join("gpgv-failing");
    fs::write(&failing, "#!/bin/sh\necho broken >&2\nexit 2\n").expect("write stub");
    fs::set_permissions(&failing, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    let hanging = dir.path().join("gpgv-hanging");
    fs::write(&hanging, "#!/bin/sh\nexec sleep 30\n").expect("write stub");
    fs::set_permissions(&hanging, fs::Permissions::from_mode(0o755)).expect("chmod stub");

    let request = VerificationRequest::new("upload.changes");

    // Warm up lazily-opened runtime descriptors before the census.
    let _ = Verifier::new().with_program(&good).verify(&request);
    let baseline = open_fd_count();

    assert!(Verifier::new().with_program(&good).verify(&request).is_ok());
    assert_eq!(open_fd_count(), baseline, "leak on the success path");

    assert!(matches!(
        Verifier::new().with_program(&failing).verify(&request),
        Err(VerifyError::Failed { .. })
    ));
    assert_eq!(open_fd_count(), baseline, "leak on the failure path");

    assert!(matches!(
        Verifier::new()
            .with_program(&hanging)
            .with_timeout(Duration::from_millis(200))
            .verify(&request),
        Err(VerifyError::Timeout { .. })
    ));
    assert_eq!(open_fd_count(), baseline, "leak on the timeout path");

    assert!(matches!(
        Verifier::new()
            .with_program("/nonexistent/sigvet-fd-hygiene-gpgv")
            .verify(&request),
        Err(VerifyError::Internal { .. })
    ));
    assert_eq!(open_fd_count(), baseline, "leak on the spawn-failure path");
}
