//! Baseline / application / post period resolution.
//!
//! Application rows are given as spreadsheet row numbers, the way a user
//! reads them in Excel. Data row 0 is the unit-marker row, so the
//! baseline may start at data row 1 at the earliest.

use crate::config::AnalysisConfig;
use crate::error::{AnalyzerError, Result};
use crate::models::Periods;
use crate::parser::Synopsis;
use std::io::{BufRead, Write};

/// Which end of the application period is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

/// Source of application rows that are not configured.
pub trait RowSource {
    /// Return a spreadsheet row in `min..=max`.
    fn application_row(
        &mut self,
        synopsis: &Synopsis,
        boundary: Boundary,
        min: u32,
        max: u32,
    ) -> Result<u32>;
}

/// Refuses to guess; used with `--no-prompt`.
pub struct NoPrompt;

impl RowSource for NoPrompt {
    fn application_row(
        &mut self,
        synopsis: &Synopsis,
        boundary: Boundary,
        min: u32,
        max: u32,
    ) -> Result<u32> {
        let (what, flag) = match boundary {
            Boundary::Start => ("start", "--start-row"),
            Boundary::End => ("end", "--end-row"),
        };
        Err(AnalyzerError::InvalidSettings(format!(
            "application {} row not configured for {} (use {} with a row in {}..={})",
            what, synopsis.table.source, flag, min, max
        )))
    }
}

/// Asks on a terminal (or any reader/writer pair) until a valid row is given.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn print_time_column(&mut self, synopsis: &Synopsis) -> Result<()> {
        writeln!(self.output, "Row  | Time")?;
        for (row, time) in synopsis.time_rows() {
            writeln!(self.output, "{:>4} | {}", row, time)?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> RowSource for TerminalPrompt<R, W> {
    fn application_row(
        &mut self,
        synopsis: &Synopsis,
        boundary: Boundary,
        min: u32,
        max: u32,
    ) -> Result<u32> {
        let question = match boundary {
            Boundary::Start => {
                self.print_time_column(synopsis)?;
                "Spreadsheet row for the start of substance application"
            }
            Boundary::End => "Spreadsheet row for the end of substance application",
        };

        loop {
            write!(
                self.output,
                "{} in {} (min. {}, max. {}): ",
                question, synopsis.table.source, min, max
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(AnalyzerError::InvalidSettings(format!(
                    "no application row given for {}",
                    synopsis.table.source
                )));
            }

            match line.trim().parse::<u32>() {
                Ok(row) if (min..=max).contains(&row) => return Ok(row),
                _ => writeln!(self.output, "Please enter a row between {} and {}.", min, max)?,
            }
        }
    }
}

/// Build the period ranges from data-row indices (`end` inclusive).
pub fn periods_from_indices(len: usize, baseline: usize, start: usize, end: usize) -> Result<Periods> {
    if start <= baseline {
        return Err(AnalyzerError::InvalidSettings(format!(
            "{} baseline measurements do not fit before data row {}",
            baseline, start
        )));
    }
    if end < start {
        return Err(AnalyzerError::InvalidSettings(format!(
            "application ends (data row {}) before it starts (data row {})",
            end, start
        )));
    }
    if end >= len {
        return Err(AnalyzerError::InvalidSettings(format!(
            "application end (data row {}) is beyond the last row ({})",
            end,
            len.saturating_sub(1)
        )));
    }

    Ok(Periods {
        pre: start - baseline..start,
        during: start..end + 1,
        post: end + 1..len,
    })
}

/// Data-row index of a spreadsheet row, if the row lies below the header.
fn row_to_index(synopsis: &Synopsis, row: u32) -> Result<usize> {
    let first = synopsis.table.header_row + 1;
    row.checked_sub(first).map(|i| i as usize).ok_or_else(|| {
        AnalyzerError::InvalidSettings(format!(
            "row {} is not a data row of {} (data starts at row {})",
            row, synopsis.table.source, first
        ))
    })
}

/// Resolve the periods of one synopsis from config, asking `source` for
/// whatever is not configured.
pub fn resolve_periods(
    synopsis: &Synopsis,
    config: &AnalysisConfig,
    source: &mut dyn RowSource,
) -> Result<Periods> {
    let len = synopsis.row_count();
    let baseline = config.baseline_count;
    let table = &synopsis.table;

    // the last data row is reserved for the post period when asking
    let last_prompt_index = len.saturating_sub(2);

    let start = match config.application_start_row {
        Some(row) => row_to_index(synopsis, row)?,
        None => {
            let min = table.sheet_row(baseline.saturating_add(1));
            let max = table.sheet_row(last_prompt_index);
            if min > max {
                return Err(AnalyzerError::InvalidSettings(format!(
                    "{} has too few rows for a baseline of {}",
                    table.source, baseline
                )));
            }
            row_to_index(synopsis, source.application_row(synopsis, Boundary::Start, min, max)?)?
        }
    };

    let end = match (config.application_end_row, config.duration_count) {
        (Some(row), _) => row_to_index(synopsis, row)?,
        (None, Some(count)) if count > 0 => start.checked_add(count - 1).ok_or_else(|| {
            AnalyzerError::InvalidSettings(format!(
                "{} measurements from data row {} exceed the addressable rows",
                count, start
            ))
        })?,
        // no duration: ask for the end row
        (None, _) => {
            let min = table.sheet_row(start);
            let max = table.sheet_row(last_prompt_index.max(start));
            row_to_index(synopsis, source.application_row(synopsis, Boundary::End, min, max)?)?
        }
    };

    periods_from_indices(len, baseline, start, end)
}
