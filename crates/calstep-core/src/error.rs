//! Error types for calstep

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using StepError
pub type Result<T> = std::result::Result<T, StepError>;

/// Main error type for step operations
#[derive(Debug, Error)]
pub enum StepError {
    /// Step input errors
    #[error(transparent)]
    Input(#[from] InputError),

    /// External tool errors
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Step input errors
#[derive(Debug, Error)]
pub enum InputError {
    /// No APK path was provided
    #[error("no apk_path input specified")]
    MissingApk,

    /// APK does not exist on disk
    #[error("apk not found at: {0}")]
    ApkNotFound(PathBuf),

    /// No features directory was provided
    #[error("no features directory specified")]
    MissingFeatures,

    /// Features directory does not exist on disk
    #[error("features directory not found at: {0}")]
    FeaturesNotFound(PathBuf),

    /// Boolean-like input with an unrecognized literal
    #[error("invalid value for boolean input: \"{0}\"")]
    InvalidBool(String),

    /// Home directory could not be resolved
    #[error("could not determine the user home directory")]
    NoHomeDir,
}

/// External tool errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Required executable is not on PATH
    #[error("'{tool}' not found on PATH - {hint}")]
    NotFound { tool: String, hint: String },

    /// The process could not be spawned
    #[error("failed to run '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    /// The process exited with a nonzero status
    #[error("'{command}' failed{}", exit_suffix(.code))]
    NonZeroExit { command: String, code: Option<i32> },

    /// The process outlived its deadline
    #[error("'{command}' timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },

    /// Unrecognized Ruby installation
    #[error("unknown ruby installation type (tried system, homebrew, rvm, rbenv)")]
    UnknownRuby,

    /// keytool keystore generation failed
    #[error("failed to generate debug keystore: {0}")]
    KeystoreGeneration(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!(" with exit code {}", code),
        None => String::from(" (terminated by signal)"),
    }
}

impl StepError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonzero_exit_message() {
        let err = ToolError::NonZeroExit {
            command: "calabash-android run app.apk".to_string(),
            code: Some(1),
        };
        assert_eq!(
            err.to_string(),
            "'calabash-android run app.apk' failed with exit code 1"
        );

        let err = ToolError::NonZeroExit {
            command: "keytool".to_string(),
            code: None,
        };
        assert!(err.to_string().ends_with("(terminated by signal)"));
    }

    #[test]
    fn test_input_error_display() {
        let err = InputError::ApkNotFound(PathBuf::from("/tmp/app.apk"));
        assert_eq!(err.to_string(), "apk not found at: /tmp/app.apk");
    }
}
