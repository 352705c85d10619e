mod statistics;

pub use statistics::{StatisticsAnalyzer, UrlTimes, rank_by_time_sum};

use crate::log::LogDescriptor;
use rust_decimal::Decimal;
use serde::Serialize;

/// Timing statistics for a single URL path.
///
/// Decimal fields serialize as strings so no precision is lost in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlStatistics {
    pub url: String,
    pub count: usize,
    pub time_sum: Decimal,
    pub time_avg: Decimal,
    pub time_max: Decimal,
    pub time_med: Decimal,
    /// Share of all parsed requests, as a fraction
    pub count_perc: Decimal,
    /// Share of the total request time, as a fraction
    pub time_perc: Decimal,
}

/// How many lines were read and how many could not be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub total_lines: usize,
    pub failed_lines: usize,
}

impl ParseSummary {
    pub fn parsed_lines(&self) -> usize {
        self.total_lines - self.failed_lines
    }

    /// Fraction of lines that failed to parse; `None` for an empty log
    pub fn error_ratio(&self) -> Option<Decimal> {
        if self.total_lines == 0 {
            return None;
        }
        Some(Decimal::from(self.failed_lines) / Decimal::from(self.total_lines))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    /// One row per URL, in first-seen order
    pub rows: Vec<UrlStatistics>,
    pub summary: ParseSummary,
}

pub trait Analyzer {
    type Output;

    fn analyze(&self, log: &LogDescriptor) -> crate::Result<Self::Output>;
}
