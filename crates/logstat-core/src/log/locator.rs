use super::{LogDescriptor, LogFormat};
use crate::Result;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;

/// File names recognized as nginx UI access logs
const LOG_NAME_PATTERN: &str = r"^nginx-access-ui\.log-(\d{8})\.(log|gz)$";

lazy_static! {
    static ref LOG_NAME: Regex = Regex::new(LOG_NAME_PATTERN).unwrap();
}

pub struct LogLocator;

impl LogLocator {
    /// Find the log with the latest date in its file name.
    ///
    /// The scan is not recursive. Returns `Ok(None)` when nothing matches;
    /// only a failure to list the directory is an error. When two files
    /// share the latest date, whichever the directory listing yields first
    /// wins.
    pub fn find_latest(dir: &Path) -> Result<Option<LogDescriptor>> {
        tracing::debug!("Scanning for nginx logs in: {}", dir.display());

        let mut latest: Option<LogDescriptor> = None;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            let Some((date, format)) = Self::parse_name(name) else {
                continue;
            };

            if latest.as_ref().is_none_or(|current| date > current.date) {
                latest = Some(LogDescriptor {
                    path: entry.path(),
                    format,
                    date,
                });
            }
        }

        match &latest {
            Some(log) => tracing::info!("Latest log: {} ({})", log.path.display(), log.date),
            None => tracing::debug!("No matching log in {}", dir.display()),
        }

        Ok(latest)
    }

    /// Extract the embedded date and format from a log file name
    pub fn parse_name(name: &str) -> Option<(NaiveDate, LogFormat)> {
        let captures = LOG_NAME.captures(name)?;
        let digits = captures.get(1)?.as_str();

        let date = match NaiveDate::parse_from_str(digits, "%Y%m%d") {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!("Skipping {}: bad date '{}': {}", name, digits, e);
                return None;
            }
        };
        let format = LogFormat::from_extension(captures.get(2)?.as_str())?;

        Some((date, format))
    }
}
