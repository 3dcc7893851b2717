//! Per-channel comparison of the baseline and application periods.

use crate::config::AnalysisConfig;
use crate::models::{
    ApplicableTest, ChannelResult, Comparison, FileAnalysis, InputFile, Periods, Response,
    SkippedChannel,
};
use crate::parser::{Channel, Synopsis};
use crate::stats::{self, StatsResult};
use tracing::{debug, info, warn};

/// Run every test on the baseline (`pre`) and application (`during`) samples.
pub fn compare(pre: &[f64], during: &[f64], config: &AnalysisConfig) -> StatsResult<Comparison> {
    let shapiro_pre = stats::shapiro_wilk(pre)?;
    let shapiro_during = stats::shapiro_wilk(during)?;
    let levene = stats::levene(&[pre, during])?;
    let student = stats::student_t(pre, during)?;
    let welch = stats::welch_t(pre, during)?;
    let mann_whitney = stats::mann_whitney_u(pre, during)?;

    let normal =
        shapiro_pre.p_value > config.normality_alpha && shapiro_during.p_value > config.normality_alpha;
    let equal_variance = levene.p_value > config.variance_alpha;

    let applicable = match (normal, equal_variance) {
        (true, true) => ApplicableTest::StudentT,
        (true, false) => ApplicableTest::WelchT,
        (false, _) => ApplicableTest::MannWhitneyU,
    };

    debug!(
        "Shapiro p {:.4}/{:.4}, Levene p {:.4}, t p {:.4}, Welch p {:.4}, MWU p {:.4} -> {}",
        shapiro_pre.p_value,
        shapiro_during.p_value,
        levene.p_value,
        student.p_value,
        welch.p_value,
        mann_whitney.p_value,
        applicable
    );

    Ok(Comparison {
        shapiro_pre,
        shapiro_during,
        normal,
        levene,
        equal_variance,
        student,
        welch,
        mann_whitney,
        applicable,
    })
}

/// Result of looking at one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOutcome {
    Significant(ChannelResult),
    Skipped(SkippedChannel),
}

/// Analyze one channel of a synopsis.
pub fn analyze_channel(
    file: &str,
    synopsis: &Synopsis,
    channel: &Channel,
    periods: &Periods,
    config: &AnalysisConfig,
) -> ChannelOutcome {
    let skip = |reason: String| {
        ChannelOutcome::Skipped(SkippedChannel {
            channel: channel.name.clone(),
            reason,
        })
    };

    let raw = synopsis.period_values(channel, periods);
    let pre = stats::present(&raw.pre);
    let during = stats::present(&raw.during);

    let comparison = match compare(&pre, &during, config) {
        Ok(c) => c,
        Err(e) => {
            warn!("{} {}: statistics could not be calculated ({})", file, channel.name, e);
            return skip(format!("statistics could not be calculated: {}", e));
        }
    };

    if !comparison.is_significant(config.p_value_threshold) {
        debug!("{} {}: not significant, ignored", file, channel.name);
        return skip("baseline not significantly different from application".to_string());
    }

    // both samples are non-empty once the tests succeeded
    let baseline = stats::mean(&pre).unwrap_or_default();
    let during_average = stats::mean(&during).unwrap_or_default();

    let response = if baseline < during_average {
        Response::Excited
    } else {
        Response::Inhibited
    };
    info!(
        "{} {}: {:?} (baseline {:.2}, application {:.2}, {} p = {:.4})",
        file,
        channel.name,
        response,
        baseline,
        during_average,
        comparison.applicable,
        comparison.applicable_outcome().p_value
    );

    let relative = raw.map(|v| (baseline != 0.0).then(|| v / baseline * 100.0));

    ChannelOutcome::Significant(ChannelResult {
        file: file.to_string(),
        channel: channel.name.clone(),
        response,
        raw,
        relative,
        baseline,
        during_average,
        comparison,
    })
}

/// Analyze every channel of a synopsis file.
pub fn analyze_file(
    input: &InputFile,
    synopsis: &Synopsis,
    periods: &Periods,
    config: &AnalysisConfig,
) -> FileAnalysis {
    let file = input.stem();
    let mut results = Vec::new();
    let mut skipped = Vec::new();

    for channel in &synopsis.channels {
        match analyze_channel(file, synopsis, channel, periods, config) {
            ChannelOutcome::Significant(result) => results.push(result),
            ChannelOutcome::Skipped(s) => skipped.push(s),
        }
    }

    let table = &synopsis.table;
    FileAnalysis {
        file: input.name.clone(),
        rows: table.row_count(),
        application_start_row: table.sheet_row(periods.during.start),
        application_end_row: table.sheet_row(periods.during.end - 1),
        periods: periods.clone(),
        channels_found: synopsis.channels.len(),
        results,
        skipped,
    }
}
