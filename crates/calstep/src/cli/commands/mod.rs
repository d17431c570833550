//! CLI command implementations

mod run;
mod run_local;

pub use run::RunCommand;
pub use run_local::RunLocalCommand;
