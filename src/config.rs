//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.synopsis-analyzer.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".synopsis-analyzer.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Synopsis sheet layout.
    #[serde(default)]
    pub synopsis: SynopsisConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where to find synopsis files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory containing the synopsis spreadsheets.
    #[serde(default = "default_input_dir")]
    pub directory: PathBuf,

    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Descend into subdirectories.
    #[serde(default)]
    pub recursive: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            directory: default_input_dir(),
            extensions: default_extensions(),
            recursive: false,
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_extensions() -> Vec<String> {
    vec!["xlsx".to_string()]
}

/// Layout of a SpAnner synopsis sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynopsisConfig {
    /// Sheet holding the per-channel data.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Header of the time column.
    #[serde(default = "default_time_column")]
    pub time_column: String,

    /// Prefix of channel column headers.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,

    /// Unit marker in the first data cell of a rate column.
    #[serde(default = "default_rate_marker")]
    pub rate_marker: String,
}

impl Default for SynopsisConfig {
    fn default() -> Self {
        Self {
            sheet_name: default_sheet_name(),
            time_column: default_time_column(),
            channel_prefix: default_channel_prefix(),
            rate_marker: default_rate_marker(),
        }
    }
}

fn default_sheet_name() -> String {
    "P2PAmplitudes2Plot".to_string()
}

fn default_time_column() -> String {
    "Time".to_string()
}

fn default_channel_prefix() -> String {
    "Ch".to_string()
}

fn default_rate_marker() -> String {
    "NoS/Minute".to_string()
}

/// Period and significance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Measurements before application averaged into the baseline.
    #[serde(default = "default_baseline_count")]
    pub baseline_count: usize,

    /// Measurements during application. Ignored when
    /// `application_end_row` is set. `0` asks for the end row instead.
    #[serde(default = "default_duration_count")]
    pub duration_count: Option<usize>,

    /// Spreadsheet row where substance application starts.
    /// Asked interactively when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_start_row: Option<u32>,

    /// Spreadsheet row where substance application ends (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_end_row: Option<u32>,

    /// A channel is significant if any difference test has p <= this.
    #[serde(default = "default_p_value_threshold")]
    pub p_value_threshold: f64,

    /// Shapiro-Wilk level for accepting normality.
    #[serde(default = "default_alpha")]
    pub normality_alpha: f64,

    /// Levene level for accepting equal variances.
    #[serde(default = "default_alpha")]
    pub variance_alpha: f64,

    /// Group name for channels with increased rate.
    #[serde(default = "default_excited_label")]
    pub excited_label: String,

    /// Group name for channels with decreased rate.
    #[serde(default = "default_inhibited_label")]
    pub inhibited_label: String,

    /// Ask for missing application rows on the terminal.
    #[serde(default = "default_true")]
    pub prompt: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            baseline_count: default_baseline_count(),
            duration_count: default_duration_count(),
            application_start_row: None,
            application_end_row: None,
            p_value_threshold: default_p_value_threshold(),
            normality_alpha: default_alpha(),
            variance_alpha: default_alpha(),
            excited_label: default_excited_label(),
            inhibited_label: default_inhibited_label(),
            prompt: true,
        }
    }
}

fn default_baseline_count() -> usize {
    7
}

fn default_duration_count() -> Option<usize> {
    Some(5)
}

fn default_p_value_threshold() -> f64 {
    0.06
}

fn default_alpha() -> f64 {
    0.05
}

fn default_excited_label() -> String {
    "Excited".to_string()
}

fn default_inhibited_label() -> String {
    "Inhibited".to_string()
}

fn default_true() -> bool {
    true
}

/// Output file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the result file.
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// Name of the result file.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Output format.
    #[serde(default)]
    pub format: crate::cli::OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            file_name: default_file_name(),
            format: crate::cli::OutputFormat::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_file_name() -> String {
    "ANALYSIS_Synopsis.xlsx".to_string()
}

impl OutputConfig {
    /// Full path of the result file, with the extension matching the format.
    pub fn path(&self) -> PathBuf {
        self.directory
            .join(&self.file_name)
            .with_extension(self.format.extension())
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.input.directory = input.clone();
        }
        if args.recursive {
            self.input.recursive = true;
        }

        if let Some(ref sheet) = args.sheet {
            self.synopsis.sheet_name = sheet.clone();
        }

        if let Some(count) = args.baseline_count {
            self.analysis.baseline_count = count;
        }
        if let Some(count) = args.duration_count {
            self.analysis.duration_count = Some(count);
        }
        if let Some(row) = args.start_row {
            self.analysis.application_start_row = Some(row);
        }
        if let Some(row) = args.end_row {
            self.analysis.application_end_row = Some(row);
        }
        if let Some(p) = args.p_threshold {
            self.analysis.p_value_threshold = p;
        }
        if args.no_prompt {
            self.analysis.prompt = false;
        }

        if let Some(ref dir) = args.output_dir {
            self.output.directory = dir.clone();
        }
        if let Some(ref name) = args.output_name {
            self.output.file_name = name.clone();
        }
        if let Some(format) = args.format {
            self.output.format = format;
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.baseline_count == 0 {
            anyhow::bail!("baseline_count must be at least 1");
        }
        for (name, value) in [
            ("p_value_threshold", a.p_value_threshold),
            ("normality_alpha", a.normality_alpha),
            ("variance_alpha", a.variance_alpha),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                anyhow::bail!("{} must be in (0, 1], got {}", name, value);
            }
        }
        if a.excited_label == a.inhibited_label {
            anyhow::bail!("excited_label and inhibited_label must differ");
        }
        for label in [&a.excited_label, &a.inhibited_label] {
            for suffix in ["_Raw", "_Rel"] {
                check_sheet_name(&format!("{}{}", label, suffix))?;
            }
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Excel limits sheet names to 31 characters without `/ \\ ? * [ ] :`.
fn check_sheet_name(name: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &['/', '\\', '?', '*', '[', ']', ':'];

    if name.chars().count() > 31 {
        anyhow::bail!("sheet name '{}' is longer than 31 characters", name);
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN.contains(c)) {
        anyhow::bail!("sheet name '{}' contains '{}'", name, c);
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        anyhow::bail!("sheet name '{}' cannot start or end with an apostrophe", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.synopsis.sheet_name, "P2PAmplitudes2Plot");
        assert_eq!(config.analysis.baseline_count, 7);
        assert_eq!(config.analysis.duration_count, Some(5));
        assert_eq!(config.analysis.p_value_threshold, 0.06);
        assert_eq!(
            config.output.path(),
            PathBuf::from("output/ANALYSIS_Synopsis.xlsx")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[input]
directory = "data"

[analysis]
baseline_count = 5
application_start_row = 23
p_value_threshold = 0.05

[output]
file_name = "summary.xlsx"
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.directory, PathBuf::from("data"));
        assert_eq!(config.input.extensions, vec!["xlsx"]);
        assert_eq!(config.analysis.baseline_count, 5);
        assert_eq!(config.analysis.application_start_row, Some(23));
        assert_eq!(config.analysis.duration_count, Some(5));
        assert_eq!(config.synopsis.rate_marker, "NoS/Minute");
        assert_eq!(config.output.path(), PathBuf::from("output/summary.json"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.analysis.baseline_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.p_value_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.inhibited_label = "Excited".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_illegal_sheet_labels() {
        let mut config = Config::default();
        config.analysis.excited_label = "Up/Down".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Up/Down_Raw"));

        let mut config = Config::default();
        config.analysis.inhibited_label = "[less]".to_string();
        assert!(config.validate().is_err());

        // 27 characters plus "_Raw" is 31 and still fits
        let mut config = Config::default();
        config.analysis.excited_label = "a".repeat(27);
        assert!(config.validate().is_ok());
        config.analysis.excited_label = "a".repeat(28);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("31 characters"));
    }

    #[test]
    fn test_zero_duration_means_ask_for_end() {
        let config: Config = toml::from_str("[analysis]\nduration_count = 0\n").unwrap();
        assert_eq!(config.analysis.duration_count, Some(0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[output]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.analysis.baseline_count, 7);
    }
}
