use anyhow::Result;
use logstat_core::Error;
use logstat_core::analysis::{Analyzer, StatisticsAnalyzer, rank_by_time_sum};
use logstat_core::config::{Config, ConfigOverrides};
use logstat_core::log::LogLocator;
use logstat_core::report::ReportRenderer;
use std::path::PathBuf;

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A new report was written
    Written(PathBuf),
    /// The report for the latest log already existed and was left untouched
    Skipped(PathBuf),
}

/// Merge overrides into the default config and run the analyzer
pub fn execute(overrides: &ConfigOverrides) -> Result<RunOutcome> {
    let config = Config::merge(&Config::default(), overrides)?;
    tracing::debug!("Effective config: {:?}", config);

    run(&config)
}

/// Build the report for the latest log in `config.log_dir`.
///
/// Nothing is written unless every step succeeds.
pub fn run(config: &Config) -> Result<RunOutcome> {
    if !config.log_dir.is_dir() {
        return Err(Error::LogDirNotFound(config.log_dir.clone()).into());
    }
    if !config.report_dir.is_dir() {
        return Err(Error::ReportDirNotFound(config.report_dir.clone()).into());
    }

    let log = LogLocator::find_latest(&config.log_dir)?
        .ok_or_else(|| Error::NoLogFound(config.log_dir.clone()))?;

    let report_path = config.report_dir.join(log.report_file_name());
    if report_path.exists() {
        tracing::info!(
            "Report {} already exists, nothing to do",
            report_path.display()
        );
        return Ok(RunOutcome::Skipped(report_path));
    }

    tracing::info!("Analyzing {}", log.path.display());

    let report = StatisticsAnalyzer::new()
        .with_error_threshold(config.error_threshold)
        .analyze(&log)?;

    if report.rows.is_empty() {
        tracing::warn!("No parseable records in {}", log.path.display());
    }

    let rows = rank_by_time_sum(report.rows, config.report_size);

    ReportRenderer::new(&config.report_template, config.report_size)
        .render_to_file(&rows, &report_path)?;

    Ok(RunOutcome::Written(report_path))
}
