//! Cross-file aggregation.
//!
//! This module pools the channel results of all analyzed files into
//! descriptive statistics per group, measure and period.

use crate::config::AnalysisConfig;
use crate::models::{
    AggregateResult, AnalysisReport, FileAnalysis, GroupSummary, Measure, Period,
    ReportMetadata, Response, Table,
};
use crate::stats::describe;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

/// Descriptive statistics of one column pooled across tables.
///
/// Returns `None` if no table has the column.
pub fn describe_column(tables: &[Table], column: &str) -> Option<AggregateResult> {
    let mut found = false;
    let mut values = Vec::new();

    for table in tables {
        if let Some(column_values) = table.numeric_column(column) {
            found = true;
            values.extend(column_values);
        }
    }

    found.then(|| describe(&values))
}

/// Count significant channels per response across files.
pub fn response_distribution(files: &[FileAnalysis]) -> BTreeMap<Response, usize> {
    let mut dist = BTreeMap::new();

    for file in files {
        for result in &file.results {
            *dist.entry(result.response).or_default() += 1;
        }
    }

    dist
}

/// Pooled statistics for every group, measure and period.
///
/// Groups appear in excited/inhibited order even when empty, so the
/// output layout does not depend on the data.
pub fn group_summaries(files: &[FileAnalysis], config: &AnalysisConfig) -> Vec<GroupSummary> {
    let mut summaries = Vec::new();

    for response in Response::ALL {
        let label = match response {
            Response::Excited => &config.excited_label,
            Response::Inhibited => &config.inhibited_label,
        };
        let channels: Vec<_> = files
            .iter()
            .flat_map(|f| &f.results)
            .filter(|r| r.response == response)
            .collect();

        for measure in [Measure::Raw, Measure::Relative] {
            for period in Period::ALL {
                let values: Vec<f64> = channels
                    .iter()
                    .flat_map(|c| match measure {
                        Measure::Raw => c.raw.get(period),
                        Measure::Relative => c.relative.get(period),
                    })
                    .flatten()
                    .copied()
                    .collect();

                summaries.push(GroupSummary {
                    group: label.clone(),
                    measure,
                    period,
                    channels: channels.len(),
                    stats: describe(&values),
                });
            }
        }
    }

    summaries
}

/// Assemble the final report from all file analyses.
pub fn build_report(
    files: Vec<FileAnalysis>,
    config: &AnalysisConfig,
    input_dir: &Path,
    duration_seconds: f64,
) -> AnalysisReport {
    let summary = group_summaries(&files, config);

    let metadata = ReportMetadata {
        generated_at: Utc::now(),
        input_dir: input_dir.display().to_string(),
        files_analyzed: files.len(),
        channels_found: files.iter().map(|f| f.channels_found).sum(),
        channels_significant: files.iter().map(|f| f.results.len()).sum(),
        baseline_count: config.baseline_count,
        p_value_threshold: config.p_value_threshold,
        duration_seconds,
    };

    AnalysisReport {
        metadata,
        excited_label: config.excited_label.clone(),
        inhibited_label: config.inhibited_label.clone(),
        files,
        summary,
    }
}
