//! Step input handling
//!
//! Bitrise-style steps receive their inputs as environment-backed strings, so
//! unset inputs arrive as empty strings and boolean inputs arrive as loose
//! literals like "yes" or "0".

use std::path::{Path, PathBuf};

use crate::error::InputError;

/// Parse a boolean-like step input.
///
/// Accepts `true|t|yes|y|1` and `false|f|no|n|0` case-insensitively. The
/// empty string is falsy (an unset input). Anything else is an error.
pub fn parse_bool(value: &str) -> Result<bool, InputError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" | "" => Ok(false),
        _ => Err(InputError::InvalidBool(value.to_string())),
    }
}

/// Parse an optional boolean-like step input. Absent is falsy.
pub fn parse_bool_opt(value: Option<&str>) -> Result<bool, InputError> {
    match value {
        Some(value) => parse_bool(value),
        None => Ok(false),
    }
}

/// Treat empty-string inputs as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate that the APK input is present and exists on disk.
pub fn validate_apk(apk: Option<&Path>) -> Result<PathBuf, InputError> {
    let apk = apk.ok_or(InputError::MissingApk)?;
    if !apk.exists() {
        return Err(InputError::ApkNotFound(apk.to_path_buf()));
    }
    Ok(apk.to_path_buf())
}

/// Validate that the features directory input is present and exists on disk.
pub fn validate_features(features: Option<&Path>) -> Result<PathBuf, InputError> {
    let features = features.ok_or(InputError::MissingFeatures)?;
    if !features.exists() {
        return Err(InputError::FeaturesNotFound(features.to_path_buf()));
    }
    Ok(features.to_path_buf())
}
