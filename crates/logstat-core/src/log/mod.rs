mod locator;
mod parser;
mod reader;

pub use locator::LogLocator;
pub use parser::{ParsedRecord, RecordParser};
pub use reader::{LogLines, LogReader};

use chrono::NaiveDate;
use std::path::PathBuf;

/// Compression of a log file, taken from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Gzip,
}

impl LogFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "log" => Some(Self::Plain),
            "gz" => Some(Self::Gzip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Plain => "log",
            LogFormat::Gzip => "gz",
        }
    }
}

/// The log file chosen for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDescriptor {
    pub path: PathBuf,
    pub format: LogFormat,
    /// Date embedded in the file name
    pub date: NaiveDate,
}

impl LogDescriptor {
    /// File name of the report built from this log, e.g. `report-2017.06.30.html`
    pub fn report_file_name(&self) -> String {
        format!("report-{}.html", self.date.format("%Y.%m.%d"))
    }
}
