//! CLI command implementations

pub mod analyze;
pub mod download;
pub mod error;

pub use analyze::AnalyzeArgs;
pub use download::{Cli, Commands, DownloadArgs, OutputFormat};
pub use error::CliError;
