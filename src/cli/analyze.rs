//! Analyze command implementation

use crate::analysis::run_analysis;
use crate::Interval;
use clap::Parser;
use std::path::PathBuf;

use super::download::{Cli, OutputFormat};
use super::CliError;

/// Analyze command arguments
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Trading symbol
    #[arg(long, default_value = "BNBUSDT")]
    pub symbol: String,

    /// Candle interval of the downloaded series
    #[arg(long, default_value = "1m")]
    pub interval: Interval,

    /// Directory holding {symbol}_{interval}_prices.json; results are written here too
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,
}

impl AnalyzeArgs {
    /// Run the analysis
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let human = cli.output_format == OutputFormat::Human;
        let summary = run_analysis(&self.data_dir, &self.symbol, self.interval, human)?;

        match cli.output_format {
            OutputFormat::Human => {
                println!("Loaded {} records", summary.records);
                println!("Price changes saved to {}", summary.paths.changes.display());
                println!();
                println!("{}", summary.preview);
            }
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "success": true,
                    "symbol": self.symbol,
                    "interval": self.interval.as_str(),
                    "records": summary.records,
                    "changes": summary.changes,
                    "unique_values": summary.unique,
                    "changes_path": summary.paths.changes.display().to_string(),
                    "frequency_path": summary.paths.frequency_full.display().to_string(),
                    "report_path": summary.paths.report.display().to_string(),
                });
                let line = serde_json::to_string(&value).map_err(|e| {
                    CliError::InvalidArgument(format!("Failed to render output: {e}"))
                })?;
                println!("{line}");
            }
        }
        Ok(())
    }
}
