//! Run configuration: command line, TOML file and the resolved settings.

mod cli;
mod file;
mod settings;

pub use cli::Cli;
pub use file::{CopySection, EndpointSection, FileConfig};
pub use settings::{resolve_workers, RunSettings};
