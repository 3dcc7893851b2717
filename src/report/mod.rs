//! Report output.
//!
//! Serializes the aggregated analysis into the result workbook or JSON.

pub mod writer;

pub use writer::{write_json, write_workbook};
