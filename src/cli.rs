//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Synopsis Analyzer - statistics for SpAnner synopsis spreadsheets
///
/// Reads every synopsis .xlsx in the input directory, compares each
/// channel's spike rate before and during substance application, and
/// writes the excited/inhibited channels into one summary workbook.
///
/// Examples:
///   synopsis-analyzer
///   synopsis-analyzer --input ./recordings --start-row 23
///   synopsis-analyzer --start-row 23 --end-row 30 --p-threshold 0.05
///   synopsis-analyzer --dry-run
///   synopsis-analyzer --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory containing synopsis spreadsheets [default: input]
    #[arg(short, long, value_name = "DIR", env = "SYNOPSIS_INPUT")]
    pub input: Option<PathBuf>,

    /// Directory receiving the result file [default: output]
    #[arg(short, long, value_name = "DIR", env = "SYNOPSIS_OUTPUT")]
    pub output_dir: Option<PathBuf>,

    /// Name of the result file [default: ANALYSIS_Synopsis.xlsx]
    #[arg(long, value_name = "FILE")]
    pub output_name: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .synopsis-analyzer.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sheet holding the channel data [default: P2PAmplitudes2Plot]
    #[arg(long, value_name = "NAME")]
    pub sheet: Option<String>,

    /// Measurements before application used for the baseline [default: 7]
    #[arg(long, value_name = "COUNT")]
    pub baseline_count: Option<usize>,

    /// Measurements during application [default: 5]
    ///
    /// 0 asks for the end row of each file instead.
    #[arg(long, value_name = "COUNT", conflicts_with = "end_row")]
    pub duration_count: Option<usize>,

    /// Spreadsheet row where substance application starts
    ///
    /// Row numbers are the ones shown by Excel. Asked interactively when
    /// neither this flag nor the config file provide it.
    #[arg(long, value_name = "ROW")]
    pub start_row: Option<u32>,

    /// Spreadsheet row where substance application ends (inclusive)
    #[arg(long, value_name = "ROW")]
    pub end_row: Option<u32>,

    /// Significance threshold for the difference tests [default: 0.06]
    #[arg(long, value_name = "P")]
    pub p_threshold: Option<f64>,

    /// Also scan subdirectories of the input directory
    #[arg(long)]
    pub recursive: bool,

    /// Never prompt; fail if the application rows are not configured
    #[arg(long)]
    pub no_prompt: bool,

    /// Output format (xlsx, json) [default: xlsx]
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: scan and parse files without writing a result
    ///
    /// Shows the channels found in each file and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .synopsis-analyzer.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the result file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Excel workbook (default)
    #[default]
    Xlsx,
    /// JSON document
    Json,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.baseline_count == Some(0) {
            return Err("Baseline count must be at least 1".to_string());
        }

        if let Some(p) = self.p_threshold {
            if !(p > 0.0 && p <= 1.0) {
                return Err("P-value threshold must be in (0, 1]".to_string());
            }
        }

        if self.start_row == Some(0) || self.end_row == Some(0) {
            return Err("Spreadsheet rows start at 1".to_string());
        }

        if let (Some(start), Some(end)) = (self.start_row, self.end_row) {
            if end < start {
                return Err("End row must not be before start row".to_string());
            }
        }

        // Validate input directory if provided
        if let Some(ref input) = self.input {
            if input.exists() && !input.is_dir() {
                return Err(format!(
                    "Input path is not a directory: {}",
                    input.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Log filter: `--verbose` and `--quiet` win over `RUST_LOG`, which
    /// wins over the info default.
    pub fn log_filter(&self) -> EnvFilter {
        if self.verbose || self.quiet {
            EnvFilter::default().add_directive(LevelFilter::from_level(self.log_level()).into())
        } else {
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy()
        }
    }
}
