//! calstep-core - Core library for the Calabash Android UI test step
//!
//! This crate provides the input handling, subprocess plumbing, keystore
//! provisioning, Ruby/gem environment handling, and result reporting used by
//! the `calstep` CLI.

pub mod calabash;
pub mod command;
pub mod envman;
pub mod error;
pub mod gemfile;
pub mod inputs;
pub mod keystore;
pub mod ruby;

pub use calabash::CalabashRunner;
pub use command::{ExternalCommand, ScopedDir};
pub use envman::Reporter;
pub use error::{InputError, Result, StepError, ToolError};
pub use ruby::{RubyEnv, RubyInstall};
