//! The calabash-android pipeline
//!
//! Runs `calabash-android resign` followed by `calabash-android run` against
//! the APK under test. Output is streamed straight through to the step log;
//! only the exit status is inspected, and any nonzero status is one terminal
//! test failure.

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::command::ExternalCommand;
use crate::error::Result;
use crate::ruby::RubyEnv;

/// Drives the external calabash-android tool.
pub struct CalabashRunner {
    ruby: Option<RubyEnv>,
    use_bundle: bool,
    verbose: bool,
    echo: bool,
    program: String,
}

impl CalabashRunner {
    /// Create a runner in the given Ruby environment.
    pub fn new(ruby: RubyEnv, use_bundle: bool, verbose: bool) -> Self {
        Self {
            ruby: Some(ruby),
            use_bundle,
            verbose,
            echo: true,
            program: "calabash-android".to_string(),
        }
    }

    /// Create a runner that invokes calabash-android straight from PATH,
    /// without Ruby environment handling.
    pub fn standalone(verbose: bool) -> Self {
        Self {
            ruby: None,
            use_bundle: false,
            verbose,
            echo: true,
            program: "calabash-android".to_string(),
        }
    }

    /// Whether the `$ cmd ...` line is echoed to stdout before each
    /// invocation. Off for quiet runs and JSON output.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Override the calabash-android executable. Used by tests to substitute
    /// a stub.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, subcommand: &str, apk: &Path, verbose_flag: bool) -> ExternalCommand {
        let apk = apk.to_string_lossy();
        let mut argv: Vec<&str> = vec![&self.program, subcommand, &apk];
        if verbose_flag {
            argv.push("-v");
        }
        match self.ruby {
            Some(ruby) => ruby.command(self.use_bundle, &argv),
            None => ExternalCommand::new(&self.program).args(argv[1..].iter().copied()),
        }
    }

    /// Resign the APK with the debug keystore.
    pub fn resign(&self, apk: &Path) -> Result<()> {
        let cmd = self.command("resign", apk, self.verbose);
        info!(command = %cmd.printable(), "resigning apk");
        if self.echo {
            println!("{}", cmd.printable());
        }
        cmd.run()
    }

    /// Run the UI tests against the APK, optionally under a wall-clock
    /// deadline.
    pub fn run(&self, apk: &Path, timeout: Option<Duration>) -> Result<()> {
        let cmd = self.command("run", apk, self.verbose);
        info!(command = %cmd.printable(), "running calabash-android tests");
        if self.echo {
            println!("{}", cmd.printable());
        }

        match timeout {
            Some(deadline) => cmd.run_with_deadline(deadline),
            None => cmd.run(),
        }
    }

    /// The full pipeline: resign, then run.
    pub fn resign_and_run(&self, apk: &Path, timeout: Option<Duration>) -> Result<()> {
        self.resign(apk)?;
        self.run(apk, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruby::RubyInstall;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;
    #[cfg(unix)]
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_stub(dir: &Path, name: &str, log: &Path, exit: i32) -> std::path::PathBuf {
        let stub = dir.join(name);
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> {log}\nexit {exit}\n",
            log = log.display(),
            exit = exit
        );
        std::fs::write(&stub, script).unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();
        stub
    }

    fn runner_with(program: &str, verbose: bool) -> CalabashRunner {
        CalabashRunner::standalone(verbose).with_program(program)
    }

    #[cfg(unix)]
    #[test]
    fn test_resign_then_run_order() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let stub = write_stub(temp.path(), "calabash-android", &log, 0);

        let runner = runner_with(&stub.to_string_lossy(), false);
        runner
            .resign_and_run(Path::new("app.apk"), None)
            .unwrap();

        let recorded = std::fs::read_to_string(&log).unwrap();
        let calls: Vec<&str> = recorded.lines().collect();
        assert_eq!(calls, vec!["resign app.apk", "run app.apk"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_appends_flag() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let stub = write_stub(temp.path(), "calabash-android", &log, 0);

        let runner = runner_with(&stub.to_string_lossy(), true);
        runner.resign(Path::new("app.apk")).unwrap();

        let recorded = std::fs::read_to_string(&log).unwrap();
        assert_eq!(recorded.trim(), "resign app.apk -v");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_run_is_a_test_failure() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let stub = write_stub(temp.path(), "calabash-android", &log, 1);

        let runner = runner_with(&stub.to_string_lossy(), false);
        let err = runner.resign_and_run(Path::new("app.apk"), None);
        assert!(err.is_err());

        // resign already failed, so run was never reached
        let recorded = std::fs::read_to_string(&log).unwrap();
        assert_eq!(recorded.lines().count(), 1);
    }

    #[test]
    fn test_bundle_exec_wraps_program() {
        let runner = CalabashRunner::new(RubyEnv::with_install(RubyInstall::Rvm), true, false);
        let cmd = runner.command("run", Path::new("app.apk"), false);
        assert_eq!(cmd.printable(), "$ bundle exec calabash-android run app.apk");
    }
}
