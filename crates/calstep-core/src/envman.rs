//! Result reporting via envman
//!
//! The host CI platform persists environment variables between pipeline steps
//! with the external `envman` tool. The test result key is only ever written
//! on the success path; failures are communicated through the exit status.

use tracing::{debug, warn};

use crate::command::ExternalCommand;
use crate::error::Result;

/// The key consumed by downstream steps.
pub const TEST_RESULT_KEY: &str = "BITRISE_XAMARIN_TEST_RESULT";

/// Reports step outputs through `envman`.
pub struct Reporter {
    program: String,
}

impl Reporter {
    /// Create a reporter using `envman` from PATH.
    pub fn new() -> Self {
        Self {
            program: "envman".to_string(),
        }
    }

    /// Override the envman executable. Used by tests to substitute a stub.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Export a single key/value pair. The value is piped via stdin so
    /// multi-line values survive.
    pub fn export(&self, key: &str, value: &str) -> Result<()> {
        debug!(key, value, "exporting environment variable");
        ExternalCommand::new(&self.program)
            .args(["add", "--key", key])
            .stdin(value)
            .run()
    }

    /// Write the success marker. A missing or failing envman degrades to a
    /// warning: the test result itself already stands at this point.
    pub fn report_succeeded(&self) {
        if which::which(&self.program).is_err() {
            warn!(
                key = TEST_RESULT_KEY,
                "envman not found on PATH, skipping result export"
            );
            return;
        }

        if let Err(e) = self.export(TEST_RESULT_KEY, "succeeded") {
            warn!(key = TEST_RESULT_KEY, error = %e, "failed to export test result");
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;
    #[cfg(unix)]
    use tempfile::TempDir;

    /// Write a stub executable that records its argv and stdin to a file.
    #[cfg(unix)]
    fn write_stub(dir: &std::path::Path, log: &std::path::Path) -> std::path::PathBuf {
        let stub = dir.join("envman-stub");
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> {log}\ncat >> {log}\nexit 0\n",
            log = log.display()
        );
        std::fs::write(&stub, script).unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();
        stub
    }

    #[cfg(unix)]
    #[test]
    fn test_export_pipes_value_via_stdin() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let stub = write_stub(temp.path(), &log);

        let reporter = Reporter::with_program(stub.to_string_lossy());
        reporter.export(TEST_RESULT_KEY, "succeeded").unwrap();

        let recorded = std::fs::read_to_string(&log).unwrap();
        assert!(recorded.contains("add --key BITRISE_XAMARIN_TEST_RESULT"));
        assert!(recorded.contains("succeeded"));
    }

    #[cfg(unix)]
    #[test]
    fn test_export_propagates_nonzero_exit() {
        let temp = TempDir::new().unwrap();
        let stub = temp.path().join("envman-fail");
        std::fs::write(&stub, "#!/bin/sh\nexit 3\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let reporter = Reporter::with_program(stub.to_string_lossy());
        assert!(reporter.export("KEY", "value").is_err());
    }
}
