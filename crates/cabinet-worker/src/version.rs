use std::ffi::OsStr;
use std::process::{Command, Stdio};

use crate::error::{WorkerError, WorkerResult};

/// Ask the emulator for its version string (`-version`).
///
/// The result is what the info database records as its build, so it can be
/// passed to [`cabinet_infodb::InfoDatabase::open`] as the expected version.
pub fn query_version(program: impl AsRef<OsStr>) -> WorkerResult<String> {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(WorkerError::SpawnFailed)?;

    let version = parse_version_output(&String::from_utf8_lossy(&output.stdout))?;
    tracing::debug!(%version, "emulator version");
    Ok(version)
}

/// First non-empty line of `-version` output.
pub fn parse_version_output(stdout: &str) -> WorkerResult<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| WorkerError::UnexpectedOutput("empty -version output".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            parse_version_output("\r\n0.250 (mame0250)\r\n").unwrap(),
            "0.250 (mame0250)"
        );
        assert!(matches!(parse_version_output(" \n"), Err(WorkerError::UnexpectedOutput(_))));
    }
}
