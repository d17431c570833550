//! Run-local command - run tests from a local features directory
//!
//! Runs calabash-android straight from PATH against a local features
//! directory. The working directory is switched to the features parent for
//! the duration of the run and restored afterwards on every exit path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use tracing::info;

use calstep_core::command::ScopedDir;
use calstep_core::envman::Reporter;
use calstep_core::{inputs, CalabashRunner};

use crate::cli::{output, Cli};

/// Resign and run Calabash features from a local features directory
#[derive(Debug, Args)]
pub struct RunLocalCommand {
    /// Calabash features directory
    #[arg(
        short = 'a',
        long,
        alias = "feautes",
        env = "features_dir",
        value_name = "DIR"
    )]
    pub features: Option<String>,

    /// Path to the APK under test
    #[arg(short = 'b', long, env = "apk_path", value_name = "PATH")]
    pub apk: Option<String>,

    /// Wall-clock limit for the test run, in seconds
    #[arg(long, env = "test_timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl RunLocalCommand {
    /// Execute the run-local command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let verbose = cli.verbose()?;
        let features = inputs::validate_features(
            inputs::non_empty(self.features.clone())
                .map(PathBuf::from)
                .as_deref(),
        )?;
        let apk = inputs::validate_apk(
            inputs::non_empty(self.apk.clone())
                .map(PathBuf::from)
                .as_deref(),
        )?;

        // The run happens from the features parent, so the APK path must
        // stay valid after the directory change.
        let apk = apk.canonicalize()?;

        info!(
            features = %features.display(),
            apk = %apk.display(),
            "executing run-local command"
        );

        let echo = cli.progress_echo();
        if echo {
            println!("{}", output::header("Configs"));
            println!(
                "{}",
                output::key_value("features", &features.display().to_string())
            );
            println!("{}", output::key_value("apk", &apk.display().to_string()));
            if let Some(timeout) = self.timeout {
                println!("{}", output::key_value("timeout", &format!("{}s", timeout)));
            }
            println!();
        }

        let runner = CalabashRunner::standalone(verbose).with_echo(echo);
        let timeout = self.timeout.map(Duration::from_secs);

        {
            let _guard = ScopedDir::enter(base_directory(&features))?;
            runner.resign_and_run(&apk, timeout)?;
        }

        Reporter::new().report_succeeded();

        if !cli.quiet {
            output::success("UI tests succeeded");
        }

        Ok(())
    }
}

/// The directory the tests run from: the parent of the features directory.
fn base_directory(features: &Path) -> &Path {
    match features.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_directory() {
        assert_eq!(
            base_directory(Path::new("/work/project/features")),
            Path::new("/work/project")
        );
        assert_eq!(base_directory(Path::new("features")), Path::new("."));
        assert_eq!(base_directory(Path::new("/")), Path::new("."));
    }

    #[cfg(unix)]
    mod pipeline {
        use super::super::*;
        use crate::cli::Cli;
        use clap::Parser;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn write_stub(dir: &Path, name: &str, body: &str) {
            let stub = dir.join(name);
            std::fs::write(&stub, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        /// A temp dir with calabash-android/envman stubs, prepended to PATH.
        fn stub_tools(calabash_exit: i32) -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
            let tools = TempDir::new().unwrap();
            let calabash_log = tools.path().join("calabash.log");
            let envman_log = tools.path().join("envman.log");

            write_stub(
                tools.path(),
                "calabash-android",
                &format!(
                    "echo \"$@\" >> {}\nexit {}",
                    calabash_log.display(),
                    calabash_exit
                ),
            );
            write_stub(
                tools.path(),
                "envman",
                &format!("echo \"$@\" >> {}\ncat > /dev/null", envman_log.display()),
            );

            let path = std::env::var("PATH").unwrap_or_default();
            std::env::set_var(
                "PATH",
                format!("{}:{}", tools.path().display(), path),
            );

            (tools, calabash_log, envman_log)
        }

        fn execute(features: &Path, apk: &Path) -> anyhow::Result<()> {
            let cli = Cli::try_parse_from([
                "calstep",
                "--quiet",
                "run-local",
                "-a",
                &features.display().to_string(),
                "-b",
                &apk.display().to_string(),
            ])
            .unwrap();
            cli.execute()
        }

        // PATH and the working directory are process-global, so the three
        // scenarios run inside one test.
        #[test]
        fn test_pipeline_ordering_and_result_export() {
            let work = TempDir::new().unwrap();
            let features = work.path().join("features");
            std::fs::create_dir(&features).unwrap();
            let apk = work.path().join("app.apk");

            // missing APK: fails before any tool runs
            let (_tools, calabash_log, envman_log) = stub_tools(0);
            assert!(execute(&features, &apk).is_err());
            assert!(!calabash_log.exists());
            assert!(!envman_log.exists());

            // green run: resign then run, success key written exactly once
            std::fs::write(&apk, b"apk").unwrap();
            execute(&features, &apk).unwrap();
            let calls = std::fs::read_to_string(&calabash_log).unwrap();
            let calls: Vec<&str> = calls.lines().collect();
            assert_eq!(calls.len(), 2);
            assert!(calls[0].starts_with("resign"));
            assert!(calls[1].starts_with("run"));
            let exported = std::fs::read_to_string(&envman_log).unwrap();
            let exported: Vec<&str> = exported.lines().collect();
            assert_eq!(
                exported,
                vec!["add --key BITRISE_XAMARIN_TEST_RESULT"]
            );

            // failing run: nonzero exit, success key never written
            let (_tools, _calabash_log, envman_log) = stub_tools(1);
            assert!(execute(&features, &apk).is_err());
            assert!(!envman_log.exists());
        }
    }
}
