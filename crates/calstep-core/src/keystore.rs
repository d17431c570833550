//! Debug keystore provisioning
//!
//! Calabash resigns the APK with the user's debug keystore. The step looks in
//! the standard Android location first, then the Xamarin location, and
//! generates a fresh keystore with `keytool` when neither exists.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::ExternalCommand;
use crate::error::{InputError, Result, ToolError};

const DEBUG_ALIAS: &str = "androiddebugkey";
const DEBUG_PASSWORD: &str = "android";
const DEBUG_DNAME: &str = "CN=Android Debug,O=Android,C=US";

/// Candidate keystore locations under the user home, in lookup order.
pub fn candidates(home: &Path) -> [PathBuf; 2] {
    [
        home.join(".android").join("debug.keystore"),
        home.join(".local")
            .join("share")
            .join("Mono for Android")
            .join("debug.keystore"),
    ]
}

/// The path a generated keystore lands at.
pub fn default_path(home: &Path) -> PathBuf {
    home.join(".android").join("debug.keystore")
}

/// The keytool argv used to generate a debug keystore at `keystore`.
pub fn keytool_args(keystore: &Path) -> Vec<String> {
    [
        "-genkey",
        "-v",
        "-keystore",
        &keystore.to_string_lossy(),
        "-alias",
        DEBUG_ALIAS,
        "-storepass",
        DEBUG_PASSWORD,
        "-keypass",
        DEBUG_PASSWORD,
        "-keyalg",
        "RSA",
        "-keysize",
        "2048",
        "-validity",
        "10000",
        "-dname",
        DEBUG_DNAME,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Find an existing debug keystore, or `None` when one must be generated.
pub fn locate(home: &Path) -> Option<PathBuf> {
    for candidate in candidates(home) {
        if candidate.exists() {
            debug!(keystore = %candidate.display(), "found debug keystore");
            return Some(candidate);
        }
        warn!(keystore = %candidate.display(), "debug keystore not found");
    }
    None
}

/// Return an existing debug keystore path, generating one with keytool when
/// no candidate exists. Generation runs at most once.
pub fn locate_or_generate(home: &Path) -> Result<PathBuf> {
    locate_or_generate_with(home, "keytool")
}

/// [`locate_or_generate`] with an explicit keytool executable. Tests
/// substitute a stub here.
pub fn locate_or_generate_with(home: &Path, keytool: &str) -> Result<PathBuf> {
    if let Some(existing) = locate(home) {
        return Ok(existing);
    }

    if which::which(keytool).is_err() {
        return Err(ToolError::NotFound {
            tool: keytool.to_string(),
            hint: "install a JDK to get keytool".to_string(),
        }
        .into());
    }

    let keystore = default_path(home);
    if let Some(parent) = keystore.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(keystore = %keystore.display(), "generating debug keystore");
    let cmd = ExternalCommand::new(keytool).args(keytool_args(&keystore));
    tracing::debug!(command = %cmd.printable(), "keytool invocation");

    cmd.run()
        .map_err(|e| ToolError::KeystoreGeneration(e.to_string()))?;

    Ok(keystore)
}

/// [`locate_or_generate`] against the current user's home directory.
pub fn provision() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(InputError::NoHomeDir)?;
    locate_or_generate(&home)
}
