//! Ruby environment handling
//!
//! calabash-android is a Ruby gem, so the step has to cope with the four ways
//! CI hosts install Ruby. The install flavor decides whether gem management
//! needs sudo and whether rbenv shims need a rehash after installs.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::command::ExternalCommand;
use crate::error::{Result, ToolError};

const SYSTEM_RUBY_PATH: &str = "/usr/bin/ruby";
const BREW_RUBY_PATH: &str = "/usr/local/bin/ruby";

/// How Ruby is installed on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubyInstall {
    /// The OS-shipped Ruby at /usr/bin/ruby
    System,
    /// Homebrew Ruby at /usr/local/bin/ruby
    Homebrew,
    /// Ruby managed by rvm
    Rvm,
    /// Ruby managed by rbenv
    Rbenv,
}

/// A detected Ruby environment.
#[derive(Debug, Clone, Copy)]
pub struct RubyEnv {
    install: RubyInstall,
}

impl RubyEnv {
    /// Detect the Ruby installation flavor on this host.
    pub fn detect() -> Result<Self> {
        let ruby_path = which::which("ruby").map_err(|_| ToolError::NotFound {
            tool: "ruby".to_string(),
            hint: "install Ruby (calabash-android is a Ruby gem)".to_string(),
        })?;

        let install = if ruby_path == Path::new(SYSTEM_RUBY_PATH) {
            RubyInstall::System
        } else if ruby_path == Path::new(BREW_RUBY_PATH) {
            RubyInstall::Homebrew
        } else if ExternalCommand::new("rvm").args(["-v"]).succeeds() {
            RubyInstall::Rvm
        } else if ExternalCommand::new("rbenv").args(["-v"]).succeeds() {
            RubyInstall::Rbenv
        } else {
            return Err(ToolError::UnknownRuby.into());
        };

        debug!(?install, ruby = %ruby_path.display(), "detected ruby installation");
        Ok(Self { install })
    }

    /// Build an environment with a known install flavor. Used by tests.
    pub fn with_install(install: RubyInstall) -> Self {
        Self { install }
    }

    /// The detected install flavor.
    pub fn install(&self) -> RubyInstall {
        self.install
    }

    /// Whether this argv needs a sudo prefix. Only system-Ruby gem
    /// management commands do.
    fn sudo_needed(&self, argv: &[String]) -> bool {
        if self.install != RubyInstall::System || argv.len() < 2 {
            return false;
        }

        let gem_management = argv[0] == "gem" || argv[0] == "bundle";
        let install_or_uninstall = argv[1] == "install" || argv[1] == "uninstall";
        gem_management && install_or_uninstall
    }

    /// The full argv for running `argv`, with `bundle exec` and `sudo`
    /// prefixes applied as required.
    pub fn command_argv(&self, use_bundle: bool, argv: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = Vec::new();
        if use_bundle {
            full.push("bundle".to_string());
            full.push("exec".to_string());
        }
        full.extend(argv.iter().map(|s| s.to_string()));

        if self.sudo_needed(&full) {
            full.insert(0, "sudo".to_string());
        }

        full
    }

    /// Build a runnable command for `argv` in this Ruby environment.
    pub fn command(&self, use_bundle: bool, argv: &[&str]) -> ExternalCommand {
        ExternalCommand::from_slice(&self.command_argv(use_bundle, argv))
    }

    /// The argv sequences that install a gem in this environment.
    ///
    /// rbenv needs a `rbenv rehash` after installs so the new shims appear.
    pub fn gem_install_argvs(&self, gem: &str, version: Option<&str>) -> Vec<Vec<String>> {
        let mut install: Vec<&str> = vec!["gem", "install", gem];
        if let Some(version) = version {
            install.push("-v");
            install.push(version);
        }
        install.push("--no-document");

        let mut argvs = vec![self.command_argv(false, &install)];
        if self.install == RubyInstall::Rbenv {
            argvs.push(self.command_argv(false, &["rbenv", "rehash"]));
        }

        argvs
    }

    /// Whether `gem` (optionally at an exact version) is installed.
    pub fn is_gem_installed(&self, gem: &str, version: Option<&str>) -> Result<bool> {
        let out = self.command(false, &["gem", "list"]).run_captured()?;
        Ok(gem_listed(&out, gem, version))
    }
}

/// Whether `gem list` output contains `gem`, optionally at `version`.
fn gem_listed(output: &str, gem: &str, version: Option<&str>) -> bool {
    let pattern = format!(r"{} \((?P<versions>.*)\)", regex::escape(gem));
    let exp = match Regex::new(&pattern) {
        Ok(exp) => exp,
        Err(_) => return false,
    };

    let Some(captures) = exp.captures(output) else {
        return false;
    };

    match version {
        None => true,
        Some(version) => captures["versions"].split(", ").any(|v| v == version),
    }
}
