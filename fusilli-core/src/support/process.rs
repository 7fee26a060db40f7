//! Subprocess execution, used by the CLI compile driver and by GPU SKU
//! autodetection. Grounded on `execCommand` in the reference implementation,
//! which shells out via `popen` and captures stdout; `std::process::Command`
//! is the direct idiomatic equivalent and no crate in the retrieved example
//! pack offers a dedicated subprocess abstraction worth reaching for.

use std::process::Command;

use crate::error::{Error, ErrorKind, Result};

/// Runs `program` with `args`, returning trimmed stdout on a zero exit code.
pub fn exec_capture(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        Error::new(
            ErrorKind::CompileFailure,
            format!("failed to spawn `{program}`: {e}"),
        )
    })?;
    if !output.status.success() {
        return Err(Error::new(
            ErrorKind::CompileFailure,
            format!(
                "`{program}` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Runs `program` with `args`, returning only whether the exit code was 0.
/// Used by the CLI compile driver, whose documented limitation is that
/// stderr is not captured on failure.
pub fn exec_status(program: &str, args: &[String]) -> Result<bool> {
    let status = Command::new(program).args(args).status().map_err(|e| {
        Error::new(
            ErrorKind::CompileFailure,
            format!("failed to spawn `{program}`: {e}"),
        )
    })?;
    Ok(status.success())
}
