//! Synchronous subprocess plumbing
//!
//! Every external tool the step touches goes through [`ExternalCommand`] so
//! spawn failures, nonzero exits, and deadlines are reported uniformly.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, ToolError};

/// Interval between child liveness checks when a deadline is set.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The `$ cmd arg ...` form used in log lines.
pub fn printable(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        format!("$ {}", program)
    } else {
        format!("$ {} {}", program, args.join(" "))
    }
}

/// Builder for a single external tool invocation.
#[derive(Debug)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<String>,
    envs: Vec<(String, String)>,
}

impl ExternalCommand {
    /// Create a new command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            envs: Vec::new(),
        }
    }

    /// Create a command from a full argv slice.
    ///
    /// An empty argv produces a command that fails to spawn.
    pub fn from_slice(argv: &[String]) -> Self {
        match argv.split_first() {
            Some((program, args)) => {
                let mut cmd = Self::new(program.clone());
                cmd.args = args.to_vec();
                cmd
            }
            None => Self::new(""),
        }
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Pipe the given string to the child's stdin.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The `$ cmd arg ...` form of this invocation.
    pub fn printable(&self) -> String {
        printable(&self.program, &self.args)
    }

    fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn build(&self, capture: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if self.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }
        if capture {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        }
        cmd
    }

    fn feed_stdin(&self, child: &mut std::process::Child) -> Result<()> {
        if let Some(ref input) = self.stdin {
            use std::io::Write;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .map_err(|e| ToolError::SpawnFailed {
                        command: self.command_line(),
                        reason: format!("failed to write stdin: {}", e),
                    })?;
            }
        }
        Ok(())
    }

    /// Run the command with inherited stdout/stderr, failing on nonzero exit.
    pub fn run(&self) -> Result<()> {
        debug!(command = %self.command_line(), "running external command");

        let mut child = self.build(false).spawn().map_err(|e| ToolError::SpawnFailed {
            command: self.command_line(),
            reason: e.to_string(),
        })?;

        self.feed_stdin(&mut child)?;

        let status = child.wait().map_err(|e| ToolError::SpawnFailed {
            command: self.command_line(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(ToolError::NonZeroExit {
                command: self.command_line(),
                code: status.code(),
            }
            .into());
        }

        Ok(())
    }

    /// Run the command and return its trimmed combined output.
    pub fn run_captured(&self) -> Result<String> {
        debug!(command = %self.command_line(), "running external command (captured)");

        let mut child = self.build(true).spawn().map_err(|e| ToolError::SpawnFailed {
            command: self.command_line(),
            reason: e.to_string(),
        })?;

        self.feed_stdin(&mut child)?;

        let output = child.wait_with_output().map_err(|e| ToolError::SpawnFailed {
            command: self.command_line(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}\n{}", stdout.trim(), stderr.trim())
            .trim()
            .to_string();

        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                command: self.command_line(),
                code: output.status.code(),
            }
            .into());
        }

        Ok(combined)
    }

    /// Whether the command runs successfully; spawn failures count as false.
    /// Output is discarded rather than piped, so a chatty probe cannot fill
    /// a pipe buffer and stall.
    pub fn succeeds(&self) -> bool {
        let mut cmd = self.build(false);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd.status().map(|s| s.success()).unwrap_or(false)
    }

    /// Run the command with a wall-clock deadline.
    ///
    /// Polls the child with `try_wait`; when the deadline passes the child is
    /// killed and a timeout error is returned.
    pub fn run_with_deadline(&self, deadline: Duration) -> Result<()> {
        debug!(
            command = %self.command_line(),
            timeout_secs = deadline.as_secs(),
            "running external command with deadline"
        );

        let mut child = self.build(false).spawn().map_err(|e| ToolError::SpawnFailed {
            command: self.command_line(),
            reason: e.to_string(),
        })?;

        self.feed_stdin(&mut child)?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        return Err(ToolError::NonZeroExit {
                            command: self.command_line(),
                            code: status.code(),
                        }
                        .into());
                    }
                    return Ok(());
                }
                Ok(None) => {
                    if started.elapsed() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ToolError::TimedOut {
                            command: self.command_line(),
                            seconds: deadline.as_secs(),
                        }
                        .into());
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(ToolError::SpawnFailed {
                        command: self.command_line(),
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }
    }
}

/// RAII working-directory change, restored on drop.
///
/// Restoration happens on every exit path, including early returns and
/// panics, while the guard is in scope.
pub struct ScopedDir {
    previous: PathBuf,
}

impl ScopedDir {
    /// Change the process working directory to `dir`.
    pub fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        debug!(dir = %dir.display(), "entered working directory");
        Ok(Self { previous })
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(
                dir = %self.previous.display(),
                error = %e,
                "failed to restore working directory"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_printable() {
        assert_eq!(printable("envman", &[]), "$ envman");
        assert_eq!(
            printable(
                "calabash-android",
                &["run".to_string(), "app.apk".to_string()]
            ),
            "$ calabash-android run app.apk"
        );
    }

    #[test]
    fn test_from_slice() {
        let argv = vec![
            "keytool".to_string(),
            "-genkey".to_string(),
            "-v".to_string(),
        ];
        let cmd = ExternalCommand::from_slice(&argv);
        assert_eq!(cmd.printable(), "$ keytool -genkey -v");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captured() {
        let out = ExternalCommand::new("echo")
            .args(["hello"])
            .run_captured()
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_nonzero_exit() {
        let err = ExternalCommand::new("false").run().unwrap_err();
        assert!(matches!(
            err,
            crate::error::StepError::Tool(ToolError::NonZeroExit { code: Some(1), .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_succeeds_with_large_output() {
        // more than a pipe buffer of output must not stall the probe
        assert!(ExternalCommand::new("sh")
            .args(["-c", "yes | head -n 100000"])
            .succeeds());
        assert!(!ExternalCommand::new("sh").args(["-c", "exit 1"]).succeeds());
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_failure() {
        let err = ExternalCommand::new("definitely-not-a-real-tool-xyz")
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::StepError::Tool(ToolError::SpawnFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_piping() {
        let out = ExternalCommand::new("cat")
            .stdin("piped value")
            .run_captured()
            .unwrap();
        assert_eq!(out, "piped value");
    }

    #[cfg(unix)]
    #[test]
    fn test_deadline_kills_long_running_child() {
        let err = ExternalCommand::new("sleep")
            .args(["30"])
            .run_with_deadline(Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::StepError::Tool(ToolError::TimedOut { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_deadline_passes_fast_child() {
        ExternalCommand::new("true")
            .run_with_deadline(Duration::from_secs(5))
            .unwrap();
    }

    #[test]
    fn test_scoped_dir_restores_on_drop() {
        let before = std::env::current_dir().unwrap();
        let temp = TempDir::new().unwrap();
        {
            let _guard = ScopedDir::enter(temp.path()).unwrap();
            assert_eq!(
                std::env::current_dir().unwrap().canonicalize().unwrap(),
                temp.path().canonicalize().unwrap()
            );
        }
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
