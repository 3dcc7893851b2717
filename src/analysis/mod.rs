//! Analysis modules.
//!
//! Period resolution, per-channel comparison and cross-file aggregation.

pub mod aggregator;
pub mod channel;
pub mod periods;

pub use aggregator::*;
pub use channel::analyze_file;
pub use periods::{resolve_periods, NoPrompt, RowSource, TerminalPrompt};
