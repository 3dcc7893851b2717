//! Result workbook generation.
//!
//! Writes the [`AnalysisReport`] into one `.xlsx` file: a raw and a relative
//! sheet per group, followed by the pooled `Summary` and the per-file `Files`
//! overview.

use crate::error::{AnalyzerError, Result};
use crate::models::{AnalysisReport, ChannelResult, Period, PeriodValues, Response, TestOutcome};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::{debug, info};

/// Columns of the `Summary` sheet after group, measure, period and channels.
const SUMMARY_STATS: [&str; 7] = ["count", "mean", "std_dev", "sem", "median", "min", "max"];

/// Write the report as an Excel workbook, replacing any existing file.
pub fn write_workbook(report: &AnalysisReport, path: &Path) -> Result<()> {
    create_parent(path)?;

    let mut workbook = Workbook::new();
    build_workbook(&mut workbook, report).map_err(|e| AnalyzerError::write(path, e))?;
    workbook
        .save(path)
        .map_err(|e| AnalyzerError::write(path, e))?;

    info!("Wrote workbook {}", path.display());
    Ok(())
}

/// Write the report as pretty-printed JSON, replacing any existing file.
pub fn write_json(report: &AnalysisReport, path: &Path) -> Result<()> {
    create_parent(path)?;

    let content = serde_json::to_string_pretty(report).map_err(|e| AnalyzerError::write(path, e))?;
    std::fs::write(path, content).map_err(|e| AnalyzerError::write(path, e))?;

    info!("Wrote JSON report {}", path.display());
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| AnalyzerError::write(path, e))
        }
        _ => Ok(()),
    }
}

fn build_workbook(workbook: &mut Workbook, report: &AnalysisReport) -> std::result::Result<(), XlsxError> {
    let bold = Format::new().set_bold();

    for response in Response::ALL {
        let label = report.group_label(response);
        let channels = report.channels(response);
        debug!("{} sheets: {} channels", label, channels.len());

        let sheet = workbook.add_worksheet();
        sheet.set_name(format!("{}_Raw", label))?;
        write_raw_sheet(sheet, &channels, &bold)?;

        let sheet = workbook.add_worksheet();
        sheet.set_name(format!("{}_Rel", label))?;
        write_relative_sheet(sheet, &channels, &bold)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Summary")?;
    write_summary_sheet(sheet, report, &bold)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Files")?;
    write_files_sheet(sheet, report, &bold)?;

    Ok(())
}

/// Header row and the Pre/During/Post blocks. Returns the next free row.
fn write_period_blocks(
    sheet: &mut Worksheet,
    channels: &[&ChannelResult],
    values: impl Fn(&ChannelResult) -> &PeriodValues,
    bold: &Format,
) -> std::result::Result<u32, XlsxError> {
    sheet.write_string_with_format(0, 0, "State", bold)?;
    for (i, channel) in channels.iter().enumerate() {
        sheet.write_string_with_format(0, column(i), channel.label(), bold)?;
    }
    sheet.set_column_width(0, 24)?;

    let mut row = 1;
    for period in Period::ALL {
        // blocks are as long as the longest channel so all channels line up
        let block = channels
            .iter()
            .map(|c| values(*c).get(period).len())
            .max()
            .unwrap_or(0);

        for offset in 0..block {
            sheet.write_string(row, 0, period.to_string())?;
            for (i, channel) in channels.iter().enumerate() {
                if let Some(Some(v)) = values(*channel).get(period).get(offset) {
                    sheet.write_number(row, column(i), *v)?;
                }
            }
            row += 1;
        }
    }

    Ok(row)
}

fn write_raw_sheet(
    sheet: &mut Worksheet,
    channels: &[&ChannelResult],
    bold: &Format,
) -> std::result::Result<(), XlsxError> {
    let mut row = write_period_blocks(sheet, channels, |c| &c.raw, bold)?;

    let p_rows: [(&str, fn(&ChannelResult) -> &TestOutcome); 3] = [
        ("Shapiro p-value pre", |c| &c.comparison.shapiro_pre),
        ("Shapiro p-value during", |c| &c.comparison.shapiro_during),
        ("Levene p-value", |c| &c.comparison.levene),
    ];
    let test_rows: [(&str, fn(&ChannelResult) -> &TestOutcome); 3] = [
        ("TTest eqVar p-value", |c| &c.comparison.student),
        ("TTest Welch p-value", |c| &c.comparison.welch),
        ("Man-Whit-U p-value", |c| &c.comparison.mann_whitney),
    ];

    for (name, outcome) in &p_rows[..2] {
        write_p_row(sheet, row, name, channels, *outcome, bold)?;
        row += 1;
    }

    sheet.write_string_with_format(row, 0, "Normal distribution", bold)?;
    for (i, c) in channels.iter().enumerate() {
        sheet.write_boolean(row, column(i), c.comparison.normal)?;
    }
    row += 1;

    let (name, outcome) = p_rows[2];
    write_p_row(sheet, row, name, channels, outcome, bold)?;
    row += 1;

    sheet.write_string_with_format(row, 0, "Equal Variance", bold)?;
    for (i, c) in channels.iter().enumerate() {
        sheet.write_boolean(row, column(i), c.comparison.equal_variance)?;
    }
    row += 1;

    for (name, outcome) in test_rows {
        write_p_row(sheet, row, name, channels, outcome, bold)?;
        row += 1;
    }

    sheet.write_string_with_format(row, 0, "Applicable test", bold)?;
    for (i, c) in channels.iter().enumerate() {
        sheet.write_string(row, column(i), c.comparison.applicable.to_string())?;
    }
    row += 1;

    write_p_row(
        sheet,
        row,
        "Applicable p-value",
        channels,
        |c| c.comparison.applicable_outcome(),
        bold,
    )?;

    Ok(())
}

fn write_p_row(
    sheet: &mut Worksheet,
    row: u32,
    name: &str,
    channels: &[&ChannelResult],
    outcome: fn(&ChannelResult) -> &TestOutcome,
    bold: &Format,
) -> std::result::Result<(), XlsxError> {
    sheet.write_string_with_format(row, 0, name, bold)?;
    for (i, c) in channels.iter().enumerate() {
        let p = outcome(*c).p_value;
        if p.is_finite() {
            sheet.write_number(row, column(i), p)?;
        }
    }
    Ok(())
}

fn write_relative_sheet(
    sheet: &mut Worksheet,
    channels: &[&ChannelResult],
    bold: &Format,
) -> std::result::Result<(), XlsxError> {
    let row = write_period_blocks(sheet, channels, |c| &c.relative, bold)?;

    sheet.write_string_with_format(row, 0, "Baseline avg", bold)?;
    for (i, c) in channels.iter().enumerate() {
        sheet.write_number(row, column(i), c.baseline)?;
    }
    Ok(())
}

fn write_summary_sheet(
    sheet: &mut Worksheet,
    report: &AnalysisReport,
    bold: &Format,
) -> std::result::Result<(), XlsxError> {
    let headers = ["Group", "Measure", "Period", "Channels"];
    for (c, h) in headers.iter().chain(SUMMARY_STATS.iter()).enumerate() {
        sheet.write_string_with_format(0, c as u16, *h, bold)?;
    }

    for (r, summary) in report.summary.iter().enumerate() {
        let row = r as u32 + 1;
        sheet.write_string(row, 0, &summary.group)?;
        sheet.write_string(row, 1, summary.measure.to_string())?;
        sheet.write_string(row, 2, summary.period.to_string())?;
        sheet.write_number(row, 3, summary.channels as f64)?;
        for (s, key) in SUMMARY_STATS.iter().enumerate() {
            if let Some(value) = summary.stats.get(*key) {
                sheet.write_number(row, headers.len() as u16 + s as u16, *value)?;
            }
        }
    }

    Ok(())
}

fn write_files_sheet(
    sheet: &mut Worksheet,
    report: &AnalysisReport,
    bold: &Format,
) -> std::result::Result<(), XlsxError> {
    let headers = [
        "File",
        "Rows",
        "Application start row",
        "Application end row",
        "Channels found",
        report.group_label(Response::Excited),
        report.group_label(Response::Inhibited),
        "Skipped channels",
    ];
    for (c, h) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, *h, bold)?;
    }

    for (r, file) in report.files.iter().enumerate() {
        let row = r as u32 + 1;
        sheet.write_string(row, 0, &file.file)?;
        sheet.write_number(row, 1, file.rows as f64)?;
        sheet.write_number(row, 2, file.application_start_row)?;
        sheet.write_number(row, 3, file.application_end_row)?;
        sheet.write_number(row, 4, file.channels_found as f64)?;
        sheet.write_number(row, 5, file.count(Response::Excited) as f64)?;
        sheet.write_number(row, 6, file.count(Response::Inhibited) as f64)?;

        let skipped: Vec<String> = file
            .skipped
            .iter()
            .map(|s| format!("{} ({})", s.channel, s.reason))
            .collect();
        sheet.write_string(row, 7, skipped.join("; "))?;
    }

    let meta = &report.metadata;
    let row = report.files.len() as u32 + 2;
    sheet.write_string_with_format(row, 0, "Generated", bold)?;
    sheet.write_string(row, 1, meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())?;
    sheet.write_string_with_format(row + 1, 0, "Input directory", bold)?;
    sheet.write_string(row + 1, 1, &meta.input_dir)?;
    sheet.write_string_with_format(row + 2, 0, "Baseline count", bold)?;
    sheet.write_number(row + 2, 1, meta.baseline_count as f64)?;
    sheet.write_string_with_format(row + 3, 0, "p-value threshold", bold)?;
    sheet.write_number(row + 3, 1, meta.p_value_threshold)?;

    Ok(())
}

/// Sheet column of the i-th channel; column 0 holds the row labels.
fn column(i: usize) -> u16 {
    i as u16 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicableTest, Comparison, FileAnalysis, Periods, SkippedChannel};
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::TempDir;

    fn outcome(p: f64) -> TestOutcome {
        TestOutcome {
            statistic: 1.0,
            p_value: p,
        }
    }

    fn channel(name: &str, response: Response, during: f64, post_len: usize) -> ChannelResult {
        let raw = PeriodValues {
            pre: vec![Some(10.0), Some(10.0)],
            during: vec![Some(during), None],
            post: vec![Some(10.0); post_len],
        };
        ChannelResult {
            file: "rec".to_string(),
            channel: name.to_string(),
            response,
            relative: raw.map(|v| Some(v / 10.0 * 100.0)),
            raw,
            baseline: 10.0,
            during_average: during,
            comparison: Comparison {
                shapiro_pre: outcome(0.5),
                shapiro_during: outcome(0.4),
                normal: true,
                levene: outcome(0.3),
                equal_variance: true,
                student: outcome(0.01),
                welch: outcome(0.02),
                mann_whitney: outcome(0.03),
                applicable: ApplicableTest::StudentT,
            },
        }
    }

    fn report() -> AnalysisReport {
        let file = FileAnalysis {
            file: "rec.xlsx".to_string(),
            rows: 8,
            application_start_row: 5,
            application_end_row: 6,
            periods: Periods {
                pre: 1..3,
                during: 3..5,
                post: 5..8,
            },
            channels_found: 3,
            results: vec![
                channel("Ch 1", Response::Excited, 20.0, 3),
                channel("Ch 2", Response::Excited, 30.0, 1),
            ],
            skipped: vec![SkippedChannel {
                channel: "Ch 3".to_string(),
                reason: "not significant".to_string(),
            }],
        };
        let config = crate::config::AnalysisConfig::default();
        crate::analysis::build_report(vec![file], &config, Path::new("input"), 0.1)
    }

    fn cell(range: &calamine::Range<Data>, row: u32, col: u32) -> Data {
        range.get_value((row, col)).cloned().unwrap_or(Data::Empty)
    }

    #[test]
    fn test_write_workbook_sheets() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("ANALYSIS_Synopsis.xlsx");
        write_workbook(&report(), &path).unwrap();
        assert!(path.exists());

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "Excited_Raw",
                "Excited_Rel",
                "Inhibited_Raw",
                "Inhibited_Rel",
                "Summary",
                "Files"
            ]
        );

        let raw = workbook.worksheet_range("Excited_Raw").unwrap();
        assert_eq!(cell(&raw, 0, 0), Data::String("State".to_string()));
        assert_eq!(cell(&raw, 0, 1), Data::String("rec: Ch 1".to_string()));
        assert_eq!(cell(&raw, 0, 2), Data::String("rec: Ch 2".to_string()));
        // 2 pre + 2 during + 3 post
        assert_eq!(cell(&raw, 1, 0), Data::String("Pre".to_string()));
        assert_eq!(cell(&raw, 3, 0), Data::String("During".to_string()));
        assert_eq!(cell(&raw, 3, 2), Data::Float(30.0));
        assert_eq!(cell(&raw, 4, 1), Data::Empty);
        assert_eq!(cell(&raw, 7, 0), Data::String("Post".to_string()));
        assert_eq!(cell(&raw, 7, 2), Data::Empty);
        assert_eq!(
            cell(&raw, 8, 0),
            Data::String("Shapiro p-value pre".to_string())
        );
        assert_eq!(cell(&raw, 10, 1), Data::Bool(true));
        assert_eq!(
            cell(&raw, 16, 1),
            Data::String("TTest eqVar".to_string())
        );
        assert_eq!(cell(&raw, 17, 1), Data::Float(0.01));

        let rel = workbook.worksheet_range("Excited_Rel").unwrap();
        assert_eq!(cell(&rel, 3, 1), Data::Float(200.0));
        assert_eq!(cell(&rel, 8, 0), Data::String("Baseline avg".to_string()));
        assert_eq!(cell(&rel, 8, 1), Data::Float(10.0));

        // empty group still gets its header
        let empty = workbook.worksheet_range("Inhibited_Raw").unwrap();
        assert_eq!(cell(&empty, 0, 0), Data::String("State".to_string()));

        let files = workbook.worksheet_range("Files").unwrap();
        assert_eq!(cell(&files, 1, 0), Data::String("rec.xlsx".to_string()));
        assert_eq!(cell(&files, 1, 5), Data::Float(2.0));
        assert_eq!(
            cell(&files, 1, 7),
            Data::String("Ch 3 (not significant)".to_string())
        );
    }

    #[test]
    fn test_summary_sheet_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("summary.xlsx");
        let report = report();
        write_workbook(&report, &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let summary = workbook.worksheet_range("Summary").unwrap();
        assert_eq!(summary.height(), report.summary.len() + 1);
        assert_eq!(cell(&summary, 0, 5), Data::String("mean".to_string()));
        // Excited / Raw / During: 20 and 30 pooled
        assert_eq!(cell(&summary, 2, 2), Data::String("During".to_string()));
        assert_eq!(cell(&summary, 2, 5), Data::Float(25.0));
    }

    #[test]
    fn test_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.xlsx");
        std::fs::write(&path, b"old").unwrap();
        write_workbook(&report(), &path).unwrap();
        assert!(open_workbook_auto(&path).is_ok());
    }

    #[test]
    fn test_invalid_sheet_name_is_write_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.xlsx");
        let mut report = report();
        report.excited_label = "bad/label".to_string();

        let err = write_workbook(&report, &path).unwrap_err();
        assert!(matches!(err, AnalyzerError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_output_directory_blocked_by_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("output");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = write_workbook(&report(), &blocker.join("out.xlsx")).unwrap_err();
        assert!(matches!(err, AnalyzerError::Write { .. }));

        let err = write_json(&report(), &blocker.join("out.json")).unwrap_err();
        assert!(matches!(err, AnalyzerError::Write { .. }));
        assert_eq!(std::fs::read(&blocker).unwrap(), b"not a directory");
    }

    #[test]
    fn test_output_path_is_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let xlsx = temp_dir.path().join("out.xlsx");
        let json = temp_dir.path().join("out.json");
        std::fs::create_dir(&xlsx).unwrap();
        std::fs::create_dir(&json).unwrap();

        let err = write_workbook(&report(), &xlsx).unwrap_err();
        assert!(matches!(err, AnalyzerError::Write { .. }));
        assert!(err.to_string().contains("out.xlsx"));

        let err = write_json(&report(), &json).unwrap_err();
        assert!(matches!(err, AnalyzerError::Write { .. }));
        assert!(xlsx.is_dir() && json.is_dir());
    }

    #[test]
    fn test_write_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");
        write_json(&report(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["metadata"]["files_analyzed"], 1);
        assert_eq!(value["files"][0]["results"][0]["channel"], "Ch 1");
        assert_eq!(value["files"][0]["results"][0]["response"], "excited");
    }
}
