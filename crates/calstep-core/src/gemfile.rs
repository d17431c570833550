//! Gemfile.lock parsing
//!
//! When the step is given a Gemfile, the sibling Gemfile.lock may pin
//! `calabash-android`. The pinned version wins over "latest" and switches the
//! step to running the tools under `bundle exec`.

use std::path::Path;

use regex::Regex;

use crate::error::{Result, StepError};

/// Extract the pinned calabash-android version from Gemfile.lock content.
///
/// Only the `specs:` section is considered; the section ends at the first
/// blank line.
pub fn calabash_version(content: &str) -> Option<String> {
    let mut relevant = Vec::new();
    let mut in_specs = false;

    for line in content.lines() {
        if line.contains("specs:") {
            in_specs = true;
        }

        if line.trim().is_empty() {
            break;
        }

        if in_specs {
            relevant.push(line);
        }
    }

    let exp = Regex::new(r"calabash-android \((.+)\)").ok()?;
    for line in relevant {
        if let Some(captures) = exp.captures(line) {
            return Some(captures[1].to_string());
        }
    }

    None
}

/// Read a Gemfile.lock and extract the pinned calabash-android version.
pub fn calabash_version_from_file(path: &Path) -> Result<Option<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StepError::other(format!("failed to read {}: {}", path.display(), e)))?;
    Ok(calabash_version(&content))
}
