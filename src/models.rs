//! Data models for the synopsis analyzer.
//!
//! This module contains the core data structures shared across the
//! pipeline: input files, parsed tables, per-channel results and the
//! final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

/// A spreadsheet discovered by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// Path relative to the input directory, `/`-separated, including extension.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
}

impl InputFile {
    /// Relative name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') => stem,
            _ => &self.name,
        }
    }
}

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    /// Returns the value if the cell holds a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value if the cell holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A sheet loaded into memory: ordered headers and positional rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Name of the file the table was read from.
    pub source: String,
    /// Column headers in sheet order.
    pub headers: Vec<String>,
    /// Data rows; each row is aligned with `headers`.
    pub rows: Vec<Vec<CellValue>>,
    /// 1-based spreadsheet row number of the header line.
    pub header_row: u32,
}

impl Table {
    /// Number of data rows (excluding the header).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of the first column with the given header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at a data row and column position. Short rows read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Iterate the cells of a column by position.
    pub fn column_at(&self, col: usize) -> impl Iterator<Item = &CellValue> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, col))
    }

    /// Iterate the cells of a named column.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &CellValue> + '_> {
        self.column_index(name).map(|col| self.column_at(col))
    }

    /// All numeric values of a named column, skipping non-numeric cells.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name)
            .map(|cells| cells.filter_map(CellValue::as_number).collect())
    }

    /// Returns the first header from `names` that is not present.
    pub fn missing_column<'a>(&self, names: &[&'a str]) -> Option<&'a str> {
        names
            .iter()
            .copied()
            .find(|name| self.column_index(name).is_none())
    }

    /// Spreadsheet row number (1-based) of a data row index.
    pub fn sheet_row(&self, index: usize) -> u32 {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.header_row.saturating_add(1).saturating_add(index)
    }
}

/// Descriptive statistics keyed by statistic name.
pub type AggregateResult = BTreeMap<String, f64>;

/// Phase of the recording relative to substance application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    Pre,
    During,
    Post,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Pre, Period::During, Period::Post];
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Pre => write!(f, "Pre"),
            Period::During => write!(f, "During"),
            Period::Post => write!(f, "Post"),
        }
    }
}

/// Data-row ranges (half-open) of the three periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Periods {
    pub pre: Range<usize>,
    pub during: Range<usize>,
    pub post: Range<usize>,
}

/// Values of one channel split by period. `None` marks a non-numeric cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodValues {
    pub pre: Vec<Option<f64>>,
    pub during: Vec<Option<f64>>,
    pub post: Vec<Option<f64>>,
}

impl PeriodValues {
    pub fn get(&self, period: Period) -> &[Option<f64>] {
        match period {
            Period::Pre => &self.pre,
            Period::During => &self.during,
            Period::Post => &self.post,
        }
    }

    /// Apply `f` to every present value, keeping gaps.
    pub fn map(&self, f: impl Fn(f64) -> Option<f64>) -> Self {
        let apply = |v: &[Option<f64>]| -> Vec<Option<f64>> {
            v.iter().map(|x| x.and_then(&f)).collect()
        };
        Self {
            pre: apply(&self.pre),
            during: apply(&self.during),
            post: apply(&self.post),
        }
    }
}

/// Statistic and p-value of a hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

/// Test used to judge the pre/during difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicableTest {
    StudentT,
    WelchT,
    MannWhitneyU,
}

impl fmt::Display for ApplicableTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicableTest::StudentT => write!(f, "TTest eqVar"),
            ApplicableTest::WelchT => write!(f, "TTest Welch"),
            ApplicableTest::MannWhitneyU => write!(f, "Man-Whit-U"),
        }
    }
}

/// Full pre vs. during comparison of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub shapiro_pre: TestOutcome,
    pub shapiro_during: TestOutcome,
    pub normal: bool,
    pub levene: TestOutcome,
    pub equal_variance: bool,
    pub student: TestOutcome,
    pub welch: TestOutcome,
    pub mann_whitney: TestOutcome,
    pub applicable: ApplicableTest,
}

impl Comparison {
    /// Outcome of the test selected by the normality/variance checks.
    pub fn applicable_outcome(&self) -> &TestOutcome {
        match self.applicable {
            ApplicableTest::StudentT => &self.student,
            ApplicableTest::WelchT => &self.welch,
            ApplicableTest::MannWhitneyU => &self.mann_whitney,
        }
    }

    /// True if any of the difference tests reaches the threshold.
    pub fn is_significant(&self, threshold: f64) -> bool {
        [&self.student, &self.welch, &self.mann_whitney]
            .iter()
            .any(|t| t.p_value <= threshold)
    }
}

/// Direction of a significant rate change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Excited,
    Inhibited,
}

impl Response {
    pub const ALL: [Response; 2] = [Response::Excited, Response::Inhibited];
}

/// A channel whose rate changed significantly during application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    /// Stem of the source file.
    pub file: String,
    /// Channel header, e.g. `Ch 12`.
    pub channel: String,
    pub response: Response,
    pub raw: PeriodValues,
    /// Raw values as percent of the baseline.
    pub relative: PeriodValues,
    pub baseline: f64,
    pub during_average: f64,
    pub comparison: Comparison,
}

impl ChannelResult {
    /// Column header used in the output workbook.
    pub fn label(&self) -> String {
        format!("{}: {}", self.file, self.channel)
    }
}

/// A channel that was left out of the result, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedChannel {
    pub channel: String,
    pub reason: String,
}

/// Outcome of analyzing one synopsis file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAnalysis {
    pub file: String,
    /// Number of data rows in the sheet.
    pub rows: usize,
    /// Spreadsheet rows bounding the application period.
    pub application_start_row: u32,
    pub application_end_row: u32,
    pub periods: Periods,
    pub channels_found: usize,
    pub results: Vec<ChannelResult>,
    pub skipped: Vec<SkippedChannel>,
}

impl FileAnalysis {
    pub fn count(&self, response: Response) -> usize {
        self.results
            .iter()
            .filter(|r| r.response == response)
            .count()
    }
}

/// Whether a summary pools raw rates or baseline-relative values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measure {
    Raw,
    Relative,
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Raw => write!(f, "Raw"),
            Measure::Relative => write!(f, "Relative"),
        }
    }
}

/// Pooled statistics for one group, measure and period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub measure: Measure,
    pub period: Period,
    pub channels: usize,
    pub stats: AggregateResult,
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub input_dir: String,
    pub files_analyzed: usize,
    pub channels_found: usize,
    pub channels_significant: usize,
    pub baseline_count: usize,
    pub p_value_threshold: f64,
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    /// Display names of the excited and inhibited groups.
    pub excited_label: String,
    pub inhibited_label: String,
    pub files: Vec<FileAnalysis>,
    pub summary: Vec<GroupSummary>,
}

impl AnalysisReport {
    pub fn group_label(&self, response: Response) -> &str {
        match response {
            Response::Excited => &self.excited_label,
            Response::Inhibited => &self.inhibited_label,
        }
    }

    /// All channel results of one group, in file then column order.
    pub fn channels(&self, response: Response) -> Vec<&ChannelResult> {
        self.files
            .iter()
            .flat_map(|f| &f.results)
            .filter(|r| r.response == response)
            .collect()
    }
}
