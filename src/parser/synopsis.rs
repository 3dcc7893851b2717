//! Synopsis layout detection.
//!
//! A SpAnner synopsis sheet has a time column and, per electrode, a
//! `Ch…` column whose left neighbour holds the spike rate. The first
//! data cell of a rate column carries the unit marker.

use crate::config::SynopsisConfig;
use crate::error::{AnalyzerError, Result};
use crate::models::{CellValue, Periods, PeriodValues, Table};
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// An electrode channel and the column holding its rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub rate_column: usize,
}

/// A validated synopsis table.
#[derive(Debug, Clone)]
pub struct Synopsis {
    pub table: Table,
    pub time_column: usize,
    pub channels: Vec<Channel>,
}

impl Synopsis {
    /// Validate the table and locate its channels.
    pub fn from_table(path: &Path, table: Table, config: &SynopsisConfig) -> Result<Self> {
        if let Some(missing) = table.missing_column(&[config.time_column.as_str()]) {
            return Err(AnalyzerError::malformed(
                path,
                format!("missing column '{}'", missing),
            ));
        }
        let time_column = table
            .column_index(&config.time_column)
            .unwrap_or_default();

        let channels: Vec<Channel> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with(&config.channel_prefix))
            .filter_map(|(col, name)| {
                if col == 0 {
                    debug!("{}: no column before {}", table.source, name);
                    return None;
                }
                let marker = table.cell(0, col - 1).as_text().map(str::trim);
                if marker != Some(config.rate_marker.as_str()) {
                    debug!(
                        "{}: column before {} is not '{}'",
                        table.source, name, config.rate_marker
                    );
                    return None;
                }
                Some(Channel {
                    name: name.clone(),
                    rate_column: col - 1,
                })
            })
            .collect();

        if channels.is_empty() {
            return Err(AnalyzerError::malformed(
                path,
                format!(
                    "no '{}' columns with '{}' rate data",
                    config.channel_prefix, config.rate_marker
                ),
            ));
        }

        Ok(Self {
            table,
            time_column,
            channels,
        })
    }

    /// Number of data rows, including the marker row.
    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Time cells with their spreadsheet row numbers, skipping the marker row.
    pub fn time_rows(&self) -> Vec<(u32, &CellValue)> {
        self.table
            .column_at(self.time_column)
            .enumerate()
            .skip(1)
            .map(|(i, cell)| (self.table.sheet_row(i), cell))
            .collect()
    }

    fn extract(&self, channel: &Channel, range: &Range<usize>) -> Vec<Option<f64>> {
        range
            .clone()
            .map(|row| self.table.cell(row, channel.rate_column).as_number())
            .collect()
    }

    /// Rate values of a channel split into the three periods.
    pub fn period_values(&self, channel: &Channel, periods: &Periods) -> PeriodValues {
        PeriodValues {
            pre: self.extract(channel, &periods.pre),
            during: self.extract(channel, &periods.during),
            post: self.extract(channel, &periods.post),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn table() -> Table {
        Table {
            source: "s.xlsx".to_string(),
            headers: vec![
                "Time".to_string(),
                "Unnamed: 1".to_string(),
                "Ch 11".to_string(),
                "Unnamed: 3".to_string(),
                "Ch 12".to_string(),
            ],
            rows: vec![
                vec![text("min"), text("NoS/Minute"), text("A"), text("Amp"), text("A")],
                vec![
                    CellValue::Number(0.0),
                    CellValue::Number(10.0),
                    CellValue::Empty,
                    CellValue::Number(1.0),
                ],
                vec![
                    CellValue::Number(1.0),
                    text("-"),
                    CellValue::Empty,
                    CellValue::Number(2.0),
                ],
                vec![CellValue::Number(2.0), CellValue::Number(12.0)],
            ],
            header_row: 1,
        }
    }

    #[test]
    fn test_detects_channels_with_rate_marker() {
        let synopsis =
            Synopsis::from_table(Path::new("s.xlsx"), table(), &SynopsisConfig::default())
                .unwrap();
        assert_eq!(
            synopsis.channels,
            vec![Channel {
                name: "Ch 11".to_string(),
                rate_column: 1
            }]
        );
        assert_eq!(synopsis.time_rows().len(), 3);
        assert_eq!(synopsis.time_rows()[0].0, 3);
    }

    #[test]
    fn test_missing_time_column() {
        let mut t = table();
        t.headers[0] = "Zeit".to_string();
        let err = Synopsis::from_table(Path::new("s.xlsx"), t, &SynopsisConfig::default())
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedInput { .. }));
        assert!(err.to_string().contains("missing column 'Time'"));
    }

    #[test]
    fn test_no_channels_is_malformed() {
        let mut t = table();
        t.rows[0][1] = text("Amp");
        let err = Synopsis::from_table(Path::new("s.xlsx"), t, &SynopsisConfig::default())
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedInput { .. }));
    }

    #[test]
    fn test_period_values_mark_non_numeric_cells() {
        let synopsis =
            Synopsis::from_table(Path::new("s.xlsx"), table(), &SynopsisConfig::default())
                .unwrap();
        let periods = Periods {
            pre: 1..2,
            during: 2..3,
            post: 3..4,
        };
        let values = synopsis.period_values(&synopsis.channels[0], &periods);
        assert_eq!(values.pre, vec![Some(10.0)]);
        assert_eq!(values.during, vec![None]);
        assert_eq!(values.post, vec![Some(12.0)]);
    }
}
