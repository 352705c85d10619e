use super::{Analyzer, ParseSummary, StatisticsReport, UrlStatistics};
use crate::log::{LogDescriptor, LogReader, ParsedRecord, RecordParser};
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug)]
struct UrlGroup {
    url: String,
    times: Vec<Decimal>,
    time_sum: Decimal,
}

/// Request times grouped by URL path, in the order URLs were first seen
#[derive(Debug, Default)]
pub struct UrlTimes {
    positions: HashMap<String, usize>,
    groups: Vec<UrlGroup>,
    total_time: Decimal,
    summary: ParseSummary,
}

impl UrlTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group every line of a log. Lines that fail to parse are counted and
    /// skipped; read errors abort.
    pub fn from_lines<I>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<String>>,
    {
        let mut times = Self::new();
        for line in lines {
            times.push_line(&line?);
        }
        Ok(times)
    }

    /// Parse a raw line and record it
    pub fn push_line(&mut self, line: &str) {
        self.summary.total_lines += 1;
        let accepted = RecordParser::parse(line).is_some_and(|record| self.record(record));
        if !accepted {
            self.summary.failed_lines += 1;
        }
    }

    /// Add one record. Returns `false`, leaving the grouping unchanged, when
    /// its time would overflow the running totals.
    pub fn record(&mut self, record: ParsedRecord) -> bool {
        let Some(total_time) = self.total_time.checked_add(record.request_time) else {
            tracing::debug!("Request time {} overflows the total", record.request_time);
            return false;
        };

        match self.positions.get(&record.url) {
            Some(&idx) => {
                let group = &mut self.groups[idx];
                let Some(time_sum) = group.time_sum.checked_add(record.request_time) else {
                    return false;
                };
                group.time_sum = time_sum;
                group.times.push(record.request_time);
            }
            None => {
                self.positions.insert(record.url.clone(), self.groups.len());
                self.groups.push(UrlGroup {
                    url: record.url,
                    times: vec![record.request_time],
                    time_sum: record.request_time,
                });
            }
        }

        self.total_time = total_time;
        true
    }

    pub fn get(&self, url: &str) -> Option<&[Decimal]> {
        self.positions
            .get(url)
            .map(|&idx| self.groups[idx].times.as_slice())
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|group| group.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn summary(&self) -> ParseSummary {
        self.summary
    }

    /// Compute per-URL statistics. Empty when nothing was parsed.
    pub fn statistics(&self) -> Vec<UrlStatistics> {
        let total_count: usize = self.groups.iter().map(|group| group.times.len()).sum();
        if total_count == 0 {
            return vec![];
        }

        let total_count = Decimal::from(total_count);

        self.groups
            .iter()
            .map(|group| {
                let count = Decimal::from(group.times.len());

                UrlStatistics {
                    url: group.url.clone(),
                    count: group.times.len(),
                    time_sum: group.time_sum,
                    time_avg: group.time_sum / count,
                    time_max: group.times.iter().max().copied().unwrap_or_default(),
                    time_med: median(&group.times),
                    count_perc: count / total_count,
                    time_perc: group
                        .time_sum
                        .checked_div(self.total_time)
                        .unwrap_or(Decimal::ZERO),
                }
            })
            .collect()
    }
}

fn median(times: &[Decimal]) -> Decimal {
    let mut sorted = times.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => Decimal::ZERO,
        len if len.is_multiple_of(2) => {
            let (low, high) = (sorted[mid - 1], sorted[mid]);
            match low.checked_add(high) {
                Some(sum) => sum / Decimal::TWO,
                None => low / Decimal::TWO + high / Decimal::TWO,
            }
        }
        _ => sorted[mid],
    }
}

/// Order rows by total time, slowest first, and keep the first `limit`.
///
/// The sort is stable, so rows with equal totals stay in first-seen order.
pub fn rank_by_time_sum(mut rows: Vec<UrlStatistics>, limit: usize) -> Vec<UrlStatistics> {
    rows.sort_by(|a, b| b.time_sum.cmp(&a.time_sum));
    rows.truncate(limit);
    rows
}

/// Builds per-URL statistics from a log file
#[derive(Debug, Default)]
pub struct StatisticsAnalyzer {
    error_threshold: Option<Decimal>,
}

impl StatisticsAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the analysis when the share of unparseable lines is above `threshold`
    pub fn with_error_threshold(mut self, threshold: Option<Decimal>) -> Self {
        self.error_threshold = threshold;
        self
    }
}

impl Analyzer for StatisticsAnalyzer {
    type Output = StatisticsReport;

    fn analyze(&self, log: &LogDescriptor) -> Result<Self::Output> {
        tracing::debug!("Collecting request times from {}", log.path.display());

        let times = UrlTimes::from_lines(LogReader::open(log)?)?;
        let summary = times.summary();
        let ratio = summary.error_ratio().unwrap_or_default();

        tracing::info!(
            "Parsed {} of {} lines ({} failed, error ratio {:.4}), {} distinct URLs",
            summary.parsed_lines(),
            summary.total_lines,
            summary.failed_lines,
            ratio,
            times.len()
        );

        if let Some(threshold) = self.error_threshold
            && ratio > threshold
        {
            return Err(Error::ErrorThresholdExceeded { ratio, threshold });
        }

        Ok(StatisticsReport {
            rows: times.statistics(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogFormat;
    use chrono::NaiveDate;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use rust_decimal_macros::dec;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn line(url: &str, time: &str) -> String {
        format!(
            concat!(
                "1.196.116.32 -  - [29/Jun/2017:03:50:22 +0300] \"GET {} HTTP/1.1\" 200 927 ",
                "\"-\" \"Lynx/2.8.8dev.9 libwww-FM/2.14 SSL-MM/1.4.1 GNUTLS/2.10.5\" \"-\" ",
                "\"1498697422-2190034393-4708-9752759\" \"dc7161be3\" {}"
            ),
            url, time
        )
    }

    fn sample_lines() -> Vec<String> {
        vec![
            line("/api/v2/group/5775925/banners", "0.626"),
            line("/export/appinstall_raw/2017-06-29/", "0.002"),
            line("/export/appinstall_raw/2017-06-30/", "0.001"),
            "not a log line".to_string(),
            line("/api/v2/banner/25019354", "0.390"),
        ]
    }

    fn group(lines: &[String]) -> UrlTimes {
        UrlTimes::from_lines(lines.iter().cloned().map(Ok)).unwrap()
    }

    fn write_gz(path: &Path, lines: &[String]) {
        let mut encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
        for l in lines {
            writeln!(encoder, "{}", l).unwrap();
        }
        encoder.finish().unwrap();
    }

    #[test]
    fn test_grouping_keeps_first_seen_order() {
        let lines = vec![
            line("/b", "0.1"),
            line("/a", "0.2"),
            line("/b?x=1", "0.3"),
            line("/c", "0.4"),
        ];
        let times = group(&lines);

        assert_eq!(times.urls().collect::<Vec<_>>(), vec!["/b", "/a", "/c"]);
        assert_eq!(times.get("/b"), Some(&[dec!(0.1), dec!(0.3)][..]));
        assert_eq!(times.summary().failed_lines, 0);
    }

    #[test]
    fn test_statistics_are_exact() {
        let lines: Vec<String> = ["0.002", "0.001", "0.003", "0.001"]
            .iter()
            .map(|t| line("/export/appinstall_raw/", t))
            .collect();
        let stats = group(&lines).statistics();

        assert_eq!(stats.len(), 1);
        let row = &stats[0];
        assert_eq!(row.url, "/export/appinstall_raw/");
        assert_eq!(row.count, 4);
        assert_eq!(row.time_sum, dec!(0.007));
        assert_eq!(row.time_avg, dec!(0.00175));
        assert_eq!(row.time_med, dec!(0.0015));
        assert_eq!(row.time_max, dec!(0.003));
        assert_eq!(row.count_perc, Decimal::ONE);
        assert_eq!(row.time_perc, Decimal::ONE);
    }

    #[test]
    fn test_odd_median_and_shares() {
        let lines = vec![
            line("/api/1/campaigns/", "0.179"),
            line("/api/1/campaigns/", "0.150"),
            line("/api/1/campaigns/", "0.156"),
            line("/api/v2/banner/", "0.515"),
        ];
        let stats = group(&lines).statistics();

        let campaigns = &stats[0];
        assert_eq!(campaigns.time_med, dec!(0.156));
        assert_eq!(campaigns.time_sum, dec!(0.485));
        assert_eq!(campaigns.count_perc, dec!(0.75));
        assert_eq!(campaigns.time_perc, dec!(0.485));
        assert_eq!(stats[1].count_perc, dec!(0.25));
    }

    #[test]
    fn test_count_perc_sums_to_one() {
        let stats = group(&sample_lines()).statistics();

        let counted: usize = stats.iter().map(|s| s.count).sum();
        assert_eq!(counted, 4);

        let total: Decimal = stats.iter().map(|s| s.count_perc).sum();
        assert!((total - Decimal::ONE).abs() < dec!(0.000001));
        let total_time: Decimal = stats.iter().map(|s| s.time_perc).sum();
        assert!((total_time - Decimal::ONE).abs() < dec!(0.000001));
    }

    #[test]
    fn test_all_malformed_lines_give_empty_table() {
        let lines = vec![
            "garbage".to_string(),
            r#"- -  - [-] "-" - - "-" "-" "-" "-" "-" -"#.to_string(),
            String::new(),
        ];
        let times = group(&lines);

        assert!(times.is_empty());
        assert!(times.statistics().is_empty());
        assert_eq!(times.summary().total_lines, 3);
        assert_eq!(times.summary().failed_lines, 3);
    }

    #[test]
    fn test_zero_total_time_has_zero_time_share() {
        let lines = vec![line("/health", "0.000"), line("/ping", "0")];
        let stats = group(&lines).statistics();
        assert!(stats.iter().all(|s| s.time_perc == Decimal::ZERO));
        assert_eq!(stats[0].count_perc, dec!(0.5));
    }

    #[test]
    fn test_overflowing_time_is_counted_as_failed() {
        let max = Decimal::MAX.to_string();
        let lines = vec![line("/a", &max), line("/a", &max), line("/b", "1")];
        let times = group(&lines);

        assert_eq!(times.summary().total_lines, 3);
        assert_eq!(times.summary().failed_lines, 2);
        assert_eq!(times.urls().collect::<Vec<_>>(), vec!["/a"]);

        let stats = times.statistics();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].time_sum, Decimal::MAX);
        assert_eq!(stats[0].time_perc, Decimal::ONE);
    }

    #[test]
    fn test_median_of_large_values() {
        let huge = Decimal::MAX - Decimal::from(11);
        assert_eq!(median(&[huge, huge + Decimal::TEN]), huge + Decimal::from(5));
    }

    #[test]
    fn test_many_small_values_do_not_drift() {
        let lines: Vec<String> = (0..10_000).map(|_| line("/tiny", "0.001")).collect();
        let stats = group(&lines).statistics();
        assert_eq!(stats[0].time_sum, dec!(10));
        assert_eq!(stats[0].time_avg, dec!(0.001));
    }

    #[test]
    fn test_rank_by_time_sum() {
        let lines = vec![
            line("/fast", "0.001"),
            line("/fast", "0.001"),
            line("/fast", "0.001"),
            line("/slow", "3.009"),
            line("/medium", "0.5"),
            line("/medium-too", "0.5"),
        ];
        let ranked = rank_by_time_sum(group(&lines).statistics(), 3);

        let urls: Vec<_> = ranked.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["/slow", "/medium", "/medium-too"]);
    }

    #[test]
    fn test_analyzer_reads_gzip_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nginx-access-ui.log-20170630.gz");
        write_gz(&path, &sample_lines());

        let log = LogDescriptor {
            path,
            format: LogFormat::Gzip,
            date: NaiveDate::from_ymd_opt(2017, 6, 30).unwrap(),
        };
        let report = StatisticsAnalyzer::new().analyze(&log).unwrap();

        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.summary.total_lines, 5);
        assert_eq!(report.summary.failed_lines, 1);
        assert_eq!(report.rows[0].url, "/api/v2/group/5775925/banners");
    }

    #[test]
    fn test_analyzer_error_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nginx-access-ui.log-20170630.log");
        fs::write(&path, sample_lines().join("\n")).unwrap();

        let log = LogDescriptor {
            path,
            format: LogFormat::Plain,
            date: NaiveDate::from_ymd_opt(2017, 6, 30).unwrap(),
        };

        let strict = StatisticsAnalyzer::new().with_error_threshold(Some(dec!(0.1)));
        assert!(matches!(
            strict.analyze(&log),
            Err(Error::ErrorThresholdExceeded { .. })
        ));

        let lenient = StatisticsAnalyzer::new().with_error_threshold(Some(dec!(0.5)));
        assert!(lenient.analyze(&log).is_ok());
    }
}
