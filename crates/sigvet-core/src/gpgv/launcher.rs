//! Verifier process launching and output multiplexing.
//!
//! One verification spawns one `gpgv` child with three result channels:
//! a single shared pipe receiving merged stdout and stderr, a dedicated
//! status pipe whose write end the child learns about through
//! `--status-fd <N>`, and the exit code. Stdin is never connected.
//!
//! Every descriptor the engine creates is close-on-exec; only the status
//! write end has the flag cleared so the child inherits it at a stable
//! number. Draining poll(2)s the two read ends until both report EOF,
//! then reaps the child, all bounded by the caller's deadline. The child
//! is killed and reaped on every early exit path.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::pipe2;
use tracing::{debug, warn};

use super::error::VerifyError;
use super::VerificationRequest;

/// Everything the child produced, collected after it terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawProcessOutput {
    /// Merged stdout and stderr bytes, in arrival order.
    pub output: Vec<u8>,
    /// Raw status channel bytes.
    pub status: Vec<u8>,
    /// Exit code; `-1` when the child was killed by a signal.
    pub exit_code: i32,
}

/// Interval between reap attempts once both channels have closed.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on one poll(2) round, so the deadline is rechecked at
/// least once a second even when the child stays silent.
const MAX_POLL_WAIT: Duration = Duration::from_secs(1);

const MERGED: usize = 0;
const STATUS: usize = 1;

struct Channel {
    file: File,
    buf: Vec<u8>,
    open: bool,
}

impl Channel {
    fn new(file: File) -> Self {
        Self {
            file,
            buf: Vec::new(),
            open: true,
        }
    }

    /// Read one chunk; EOF closes the channel.
    fn fill(&mut self) -> Result<(), VerifyError> {
        let mut chunk = [0u8; 4096];
        match self.file.read(&mut chunk) {
            Ok(0) => self.open = false,
            Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                return Err(VerifyError::Internal {
                    detail: format!("reading verifier output: {err}"),
                })
            }
        }
        Ok(())
    }
}

/// A running verifier child with its two parent-held read ends.
///
/// Dropping an undrained handle kills and reaps the child, so no exit
/// path can leak a zombie or a descriptor.
pub(crate) struct GpgvProcess {
    child: Child,
    channels: [Channel; 2],
    reaped: bool,
}

/// Build the verifier command line.
///
/// Order: `--status-fd <N>`, one `--keyring <path>` per keyring in
/// request order, the primary filename, then the detached-signature
/// filename last when present. Stdin is disconnected.
fn build_command(program: &Path, request: &VerificationRequest, status_fd: RawFd) -> Command {
    let mut command = Command::new(program);
    command.arg("--status-fd").arg(status_fd.to_string());
    for keyring in request.keyrings() {
        command.arg("--keyring").arg(keyring);
    }
    command.arg(request.filename());
    if let Some(signature) = request.detached_signature() {
        command.arg(signature);
    }
    command.stdin(Stdio::null());
    command
}

/// Spawn the verifier for `request`.
///
/// # Errors
///
/// Returns [`VerifyError::Internal`] when pipe setup or the spawn itself
/// fails. A spawn failure means a broken installation, never a bad
/// signature.
pub(crate) fn launch(
    program: &Path,
    request: &VerificationRequest,
) -> Result<GpgvProcess, VerifyError> {
    let internal = |detail: String| VerifyError::Internal { detail };

    let (status_read, status_write) =
        pipe2(OFlag::O_CLOEXEC).map_err(|err| internal(format!("creating status pipe: {err}")))?;
    let (merged_read, merged_write) =
        pipe2(OFlag::O_CLOEXEC).map_err(|err| internal(format!("creating output pipe: {err}")))?;

    // The child must inherit the status write end at its current number;
    // every other engine-held descriptor stays close-on-exec.
    fcntl(&status_write, FcntlArg::F_SETFD(FdFlag::empty()))
        .map_err(|err| internal(format!("configuring status pipe inheritance: {err}")))?;

    let stderr_write = merged_write
        .try_clone()
        .map_err(|err| internal(format!("duplicating output pipe: {err}")))?;

    let mut command = build_command(program, request, status_write.as_raw_fd());
    command
        .stdout(Stdio::from(merged_write))
        .stderr(Stdio::from(stderr_write));

    debug!(
        program = %program.display(),
        file = %request.filename().display(),
        status_fd = status_write.as_raw_fd(),
        "spawning verifier"
    );
    let child = command
        .spawn()
        .map_err(|err| internal(format!("spawning {}: {err}", program.display())))?;

    // Close the parent's copy of the status write end, otherwise the read
    // end never reports EOF.
    drop(status_write);

    Ok(GpgvProcess {
        child,
        channels: [
            Channel::new(File::from(merged_read)),
            Channel::new(File::from(status_read)),
        ],
        reaped: false,
    })
}

impl GpgvProcess {
    /// Read both channels until the child closes them, then reap it.
    ///
    /// Bytes are appended per channel in arrival order; no ordering holds
    /// between the channels. The whole drain, including the final reap,
    /// is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Timeout`] when the child fails to complete
    /// in time (it is killed and reaped first), or
    /// [`VerifyError::Internal`] on a poll or read failure.
    pub(crate) fn drain(mut self, timeout: Duration) -> Result<RawProcessOutput, VerifyError> {
        let deadline = Instant::now() + timeout;

        while self.channels.iter().any(|channel| channel.open) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Err(self.abort_timed_out(timeout));
            };
            let wait = remaining.min(MAX_POLL_WAIT);
            let poll_timeout =
                u16::try_from(wait.as_millis()).map_or(PollTimeout::MAX, PollTimeout::from);

            let mut poll_fds: Vec<PollFd> = self
                .channels
                .iter()
                .filter(|channel| channel.open)
                .map(|channel| PollFd::new(channel.file.as_fd(), PollFlags::POLLIN))
                .collect();
            let ready: Vec<bool> = match poll(&mut poll_fds, poll_timeout) {
                Ok(0) => continue,
                Ok(_) => poll_fds
                    .iter()
                    .map(|fd| fd.revents().is_some_and(|events| !events.is_empty()))
                    .collect(),
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    return Err(VerifyError::Internal {
                        detail: format!("polling verifier output: {err}"),
                    })
                }
            };
            drop(poll_fds);

            let mut ready = ready.into_iter();
            for channel in self.channels.iter_mut().filter(|channel| channel.open) {
                if ready.next() == Some(true) {
                    channel.fill()?;
                }
            }
        }

        // Both channels are at EOF; the child is exiting or has exited.
        let status = loop {
            match self.child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Err(self.abort_timed_out(timeout));
                    }
                    std::thread::sleep(REAP_POLL_INTERVAL);
                }
                Err(err) => {
                    return Err(VerifyError::Internal {
                        detail: format!("waiting for verifier: {err}"),
                    })
                }
            }
        };
        self.reaped = true;

        let exit_code = status.code().unwrap_or(-1);
        debug!(
            exit_code,
            output_bytes = self.channels[MERGED].buf.len(),
            status_bytes = self.channels[STATUS].buf.len(),
            "verifier exited"
        );
        Ok(RawProcessOutput {
            output: std::mem::take(&mut self.channels[MERGED].buf),
            status: std::mem::take(&mut self.channels[STATUS].buf),
            exit_code,
        })
    }

    fn abort_timed_out(&mut self, limit: Duration) -> VerifyError {
        warn!(limit_secs = limit.as_secs(), "verifier did not complete in time, killing it");
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
        VerifyError::Timeout { limit }
    }
}

impl Drop for GpgvProcess {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::build_command;
    use crate::gpgv::VerificationRequest;

    fn args_of(command: &std::process::Command) -> Vec<String> {
        command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn command_line_order_is_fixed() {
        let request = VerificationRequest::new("upload.changes")
            .with_keyring("/etc/keyrings/a.gpg")
            .with_keyring("/etc/keyrings/b.gpg")
            .with_detached_signature("upload.changes.sig");
        let command = build_command(Path::new("gpgv"), &request, 7);

        assert_eq!(command.get_program(), "gpgv");
        assert_eq!(
            args_of(&command),
            vec![
                "--status-fd",
                "7",
                "--keyring",
                "/etc/keyrings/a.gpg",
                "--keyring",
                "/etc/keyrings/b.gpg",
                "upload.changes",
                "upload.changes.sig",
            ]
        );
    }

    #[test]
    fn detached_signature_is_omitted_for_attached_verification() {
        let request = VerificationRequest::new("inline.asc").with_keyring("ring.gpg");
        let args = args_of(&build_command(Path::new("gpgv"), &request, 3));
        assert_eq!(
            args,
            vec!["--status-fd", "3", "--keyring", "ring.gpg", "inline.asc"]
        );
    }

    #[test]
    fn keyrings_are_optional() {
        let request = VerificationRequest::new("inline.asc");
        let args = args_of(&build_command(Path::new("gpgv"), &request, 3));
        assert_eq!(args, vec!["--status-fd", "3", "inline.asc"]);
    }
}
