//! Child-process execution for converter binaries.
//!
//! Children are awaited on the runtime and killed when the future is
//! dropped, so a timed-out run leaves no process behind.

use crate::error::{truncate_chars, ConvertError, MAX_STDERR_CHARS};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Run `program args…` to completion and return its stdout.
///
/// * program missing → [`ConvertError::BackendUnavailable`] (named `backend`)
/// * non-zero exit → [`ConvertError::Conversion`] with the first
///   [`MAX_STDERR_CHARS`] characters of stderr
/// * `timeout` exceeded → [`ConvertError::Conversion`]; the child is killed
pub async fn run<I, S>(
    backend: &str,
    program: impl AsRef<OsStr>,
    args: I,
    timeout: Duration,
) -> Result<Vec<u8>, ConvertError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(backend, program = ?program, "Spawning converter process");
    let start = Instant::now();

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ConvertError::BackendUnavailable {
                backend: backend.to_string(),
                reason: format!("executable {program:?} not found"),
            }
        } else {
            ConvertError::BackendUnavailable {
                backend: backend.to_string(),
                reason: format!("failed to start {program:?}: {e}"),
            }
        }
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result
            .map_err(|e| ConvertError::Internal(format!("waiting for {backend}: {e}")))?,
        Err(_) => {
            return Err(ConvertError::Conversion(format!(
                "{backend} timed out after {}s",
                timeout.as_secs()
            )))
        }
    };

    debug!(
        backend,
        status = ?output.status.code(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Converter process finished"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        return Err(ConvertError::Conversion(format!(
            "{backend} exited with {code}: {}",
            truncate_chars(stderr.trim(), MAX_STDERR_CHARS)
        )));
    }

    Ok(output.stdout)
}
