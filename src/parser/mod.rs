//! Spreadsheet parsing.
//!
//! Loads one sheet of a workbook into a [`Table`] and extracts the
//! synopsis layout from it.

pub mod synopsis;

pub use synopsis::{Channel, Synopsis};

use crate::error::{AnalyzerError, Result};
use crate::models::{CellValue, Table};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::debug;

/// Convert a calamine cell into our cell model.
fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}

fn header_name(data: &Data, col: usize) -> String {
    match cell_value(data) {
        CellValue::Empty => format!("Unnamed: {}", col),
        other => other.to_string().trim().to_string(),
    }
}

/// Read a sheet into a table. The first row of the used range is the header.
pub fn read_table(path: &Path, sheet_name: &str) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AnalyzerError::malformed(path, format!("cannot open workbook: {}", e)))?;

    if !workbook.sheet_names().iter().any(|s| s == sheet_name) {
        return Err(AnalyzerError::malformed(
            path,
            format!("sheet '{}' not found", sheet_name),
        ));
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| AnalyzerError::malformed(path, format!("cannot read sheet: {}", e)))?;
    debug!("Opened sheet '{}' of {}", sheet_name, path.display());

    let header_row = range.start().map(|(row, _)| row + 1).unwrap_or(1);
    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells
            .iter()
            .enumerate()
            .map(|(col, c)| header_name(c, col))
            .collect(),
        None => {
            return Err(AnalyzerError::malformed(
                path,
                format!("sheet '{}' is empty", sheet_name),
            ))
        }
    };

    let rows: Vec<Vec<CellValue>> = rows
        .map(|cells| cells.iter().map(cell_value).collect())
        .collect();

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(Table {
        source,
        headers,
        rows,
        header_row,
    })
}

/// Write a small synopsis-shaped workbook for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use rust_xlsxwriter::Workbook;
    use std::path::Path;

    pub const SHEET: &str = "P2PAmplitudes2Plot";

    /// One channel per entry of `channels`: a `NoS/Minute` rate column
    /// followed by its `Ch` column.
    pub fn write_synopsis(path: &Path, channels: &[(&str, &[f64])]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET).unwrap();

        let rows = channels.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        sheet.write_string(0, 0, "Time").unwrap();
        sheet.write_string(1, 0, "min").unwrap();
        for r in 0..rows {
            sheet.write_number(r as u32 + 2, 0, r as f64).unwrap();
        }

        for (i, (name, values)) in channels.iter().enumerate() {
            let rate_col = 1 + 2 * i as u16;
            sheet.write_string(1, rate_col, "NoS/Minute").unwrap();
            sheet.write_string(0, rate_col + 1, *name).unwrap();
            sheet.write_string(1, rate_col + 1, "Amplitude").unwrap();
            for (r, v) in values.iter().enumerate() {
                sheet.write_number(r as u32 + 2, rate_col, *v).unwrap();
                sheet.write_number(r as u32 + 2, rate_col + 1, 0.0).unwrap();
            }
        }

        workbook.save(path).unwrap();
    }

    /// A workbook with a single sheet of arbitrary string/number columns.
    pub fn write_columns(path: &Path, sheet_name: &str, columns: &[(&str, &[f64])]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name).unwrap();
        for (c, (name, values)) in columns.iter().enumerate() {
            sheet.write_string(0, c as u16, *name).unwrap();
            for (r, v) in values.iter().enumerate() {
                sheet.write_number(r as u32 + 1, c as u16, *v).unwrap();
            }
        }
        workbook.save(path).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_table_headers_and_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.xlsx");
        write_synopsis(&path, &[("Ch 12", &[5.0, 6.0, 7.0])]);

        let table = read_table(&path, SHEET).unwrap();
        assert_eq!(table.source, "a.xlsx");
        assert_eq!(table.headers, vec!["Time", "Unnamed: 1", "Ch 12"]);
        assert_eq!(table.header_row, 1);
        // marker row plus three measurements
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.cell(0, 1), &CellValue::Text("NoS/Minute".to_string()));
        assert_eq!(table.cell(3, 1), &CellValue::Number(7.0));
    }

    #[test]
    fn test_missing_sheet_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.xlsx");
        write_columns(&path, "Other", &[("duration", &[1.0])]);

        let err = read_table(&path, SHEET).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedInput { .. }));
        assert!(err.to_string().contains("P2PAmplitudes2Plot"));
    }

    #[test]
    fn test_garbage_file_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        assert!(matches!(
            read_table(&path, SHEET),
            Err(AnalyzerError::MalformedInput { .. })
        ));
    }
}
