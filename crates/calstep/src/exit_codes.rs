//! Exit codes for the CLI

#![allow(dead_code)]

use calstep_core::{InputError, StepError, ToolError};

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Step input error (missing/nonexistent path, invalid boolean)
pub const INPUT_ERROR: i32 = 2;

/// An external tool could not be run
pub const TOOL_ERROR: i32 = 3;

/// The calabash-android test run failed or timed out
pub const TEST_FAILED: i32 = 4;

/// Map an error from the step pipeline to an exit code.
pub fn for_error(err: &anyhow::Error) -> i32 {
    if let Some(step) = err.downcast_ref::<StepError>() {
        return match step {
            StepError::Input(input) => for_input(input),
            StepError::Tool(tool) => for_tool(tool),
            _ => ERROR,
        };
    }
    if let Some(input) = err.downcast_ref::<InputError>() {
        return for_input(input);
    }
    if let Some(tool) = err.downcast_ref::<ToolError>() {
        return for_tool(tool);
    }
    ERROR
}

fn for_input(_err: &InputError) -> i32 {
    INPUT_ERROR
}

fn for_tool(err: &ToolError) -> i32 {
    match err {
        ToolError::NonZeroExit { .. } | ToolError::TimedOut { .. } => TEST_FAILED,
        _ => TOOL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calstep_core::InputError;

    #[test]
    fn test_input_errors_map_to_input_code() {
        let err = anyhow::Error::from(StepError::Input(InputError::MissingApk));
        assert_eq!(for_error(&err), INPUT_ERROR);
    }

    #[test]
    fn test_nonzero_exit_maps_to_test_failed() {
        let err = anyhow::Error::from(StepError::Tool(ToolError::NonZeroExit {
            command: "calabash-android run app.apk".to_string(),
            code: Some(1),
        }));
        assert_eq!(for_error(&err), TEST_FAILED);
    }

    #[test]
    fn test_unknown_errors_map_to_general_code() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(for_error(&err), ERROR);
    }
}
