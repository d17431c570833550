//! Run command - the full CI step
//!
//! Installs the calabash-android gem (pinned from a Gemfile.lock or an
//! explicit input), provisions the debug keystore, resigns the APK, runs the
//! UI tests, and exports the result for downstream steps.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use tracing::info;

use calstep_core::command::ExternalCommand;
use calstep_core::envman::Reporter;
use calstep_core::error::Result;
use calstep_core::{gemfile, inputs, keystore, CalabashRunner, RubyEnv};

use crate::cli::{output, Cli, OutputFormat};

/// Full CI step: install calabash-android, provision the debug keystore,
/// resign and run the APK, and export the result
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Path to the APK under test
    #[arg(short = 'b', long, env = "apk_path", value_name = "PATH")]
    pub apk: Option<String>,

    /// Explicit calabash-android gem version; overrides the Gemfile.lock
    #[arg(long, env = "calabash_android_version", value_name = "VERSION")]
    pub calabash_version: Option<String>,

    /// Gemfile whose sibling Gemfile.lock pins calabash-android; switches
    /// gem installation and tool invocations to bundler
    #[arg(long, env = "gem_file_path", value_name = "PATH")]
    pub gemfile: Option<String>,
}

/// How the calabash-android gem gets installed and invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GemResolution {
    /// Pinned gem version; `None` means latest
    version: Option<String>,
    /// Install with `bundle install` and run under `bundle exec`
    use_bundle: bool,
    /// The Gemfile driving bundler, when bundling
    gemfile: Option<PathBuf>,
}

/// Step summary for `--format json`.
#[derive(Debug, Serialize)]
struct RunSummary {
    apk: String,
    calabash_version: Option<String>,
    use_bundle: bool,
    keystore: String,
    result: &'static str,
}

impl RunCommand {
    /// Execute the run command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let verbose = cli.verbose()?;
        let apk = inputs::validate_apk(
            inputs::non_empty(self.apk.clone())
                .map(PathBuf::from)
                .as_deref(),
        )?;
        info!(apk = %apk.display(), "executing run command");

        let echo = cli.progress_echo();
        if echo {
            println!("{}", output::header("Configs"));
            println!("{}", output::key_value("apk", &apk.display().to_string()));
            println!(
                "{}",
                output::key_value(
                    "calabash_version",
                    self.calabash_version.as_deref().unwrap_or("(latest)")
                )
            );
            println!(
                "{}",
                output::key_value("gemfile", self.gemfile.as_deref().unwrap_or("(none)"))
            );
            println!();
        }

        let ruby = RubyEnv::detect()?;

        let resolution = resolve_gem_version(
            inputs::non_empty(self.calabash_version.clone()),
            inputs::non_empty(self.gemfile.clone())
                .map(PathBuf::from)
                .as_deref(),
        );
        if echo {
            match resolution.version.as_deref() {
                Some(version) => output::info(&format!("using calabash-android {}", version)),
                None => output::info("using calabash-android latest version"),
            }
        }

        install_gem(&ruby, &resolution, echo)?;

        let keystore = keystore::provision()?;
        if echo {
            output::info(&format!("using debug keystore: {}", keystore.display()));
        }

        let runner = CalabashRunner::new(ruby, resolution.use_bundle, verbose).with_echo(echo);
        runner.resign_and_run(&apk, None)?;

        Reporter::new().report_succeeded();

        match cli.format {
            OutputFormat::Json => {
                let summary = RunSummary {
                    apk: apk.display().to_string(),
                    calabash_version: resolution.version.clone(),
                    use_bundle: resolution.use_bundle,
                    keystore: keystore.display().to_string(),
                    result: "succeeded",
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    output::success("UI tests succeeded");
                }
            }
        }

        Ok(())
    }
}

/// Work out which calabash-android version to use and whether to bundle.
///
/// An explicit version input beats a Gemfile.lock pin, which beats latest.
/// A Gemfile with a sibling Gemfile.lock switches the step to bundler, even
/// when the lock does not pin calabash-android.
fn resolve_gem_version(explicit: Option<String>, gemfile: Option<&Path>) -> GemResolution {
    let mut resolution = GemResolution {
        version: None,
        use_bundle: false,
        gemfile: None,
    };

    if let Some(gemfile) = gemfile {
        if gemfile.exists() {
            let lock = gemfile
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("Gemfile.lock");
            if lock.exists() {
                match gemfile::calabash_version_from_file(&lock) {
                    Ok(version) => {
                        info!(
                            lock = %lock.display(),
                            version = version.as_deref().unwrap_or("(unpinned)"),
                            "found Gemfile.lock"
                        );
                        resolution.version = version;
                        resolution.use_bundle = true;
                        resolution.gemfile = Some(gemfile.to_path_buf());
                    }
                    Err(e) => {
                        output::warning(&format!("failed to read {}: {}", lock.display(), e));
                    }
                }
            } else {
                output::warning(&format!("no Gemfile.lock next to {}", gemfile.display()));
            }
        } else {
            output::warning(&format!("Gemfile not found at {}", gemfile.display()));
        }
    }

    if let Some(explicit) = explicit {
        resolution.version = Some(explicit);
        resolution.use_bundle = false;
        resolution.gemfile = None;
    }

    resolution
}

/// Install calabash-android the way the resolution asks for.
fn install_gem(ruby: &RubyEnv, resolution: &GemResolution, echo: bool) -> Result<()> {
    if resolution.use_bundle {
        let mut cmd = ruby.command(false, &["bundle", "install", "--jobs", "20", "--retry", "5"]);
        if let Some(ref gemfile) = resolution.gemfile {
            cmd = cmd.env("BUNDLE_GEMFILE", gemfile.display().to_string());
        }
        if echo {
            println!("{}", cmd.printable());
        }
        return cmd.run();
    }

    if let Some(ref version) = resolution.version {
        if ruby.is_gem_installed("calabash-android", Some(version))? {
            if echo {
                output::info(&format!("calabash-android {} already installed", version));
            }
            return Ok(());
        }
    }

    for argv in ruby.gem_install_argvs("calabash-android", resolution.version.as_deref()) {
        let cmd = ExternalCommand::from_slice(&argv);
        if echo {
            println!("{}", cmd.printable());
        }
        cmd.run()?;
    }

    Ok(())
}
