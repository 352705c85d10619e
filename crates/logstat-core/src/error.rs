use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode report data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    InvalidConfig(String),

    #[error("Invalid REPORT_SIZE value '{0}': expected a positive integer")]
    InvalidReportSize(String),

    #[error("Invalid ERROR_THRESHOLD value '{0}': expected a decimal between 0 and 1")]
    InvalidErrorThreshold(String),

    #[error("Log directory not found: {}", .0.display())]
    LogDirNotFound(PathBuf),

    #[error("Report directory not found: {}", .0.display())]
    ReportDirNotFound(PathBuf),

    #[error("No nginx access log found in {}", .0.display())]
    NoLogFound(PathBuf),

    #[error("Report template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Malformed report template {}: {reason}", .path.display())]
    MalformedTemplate { path: PathBuf, reason: String },

    #[error("Failed to write report {}: {source}", .path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error ratio {ratio} exceeds threshold {threshold}")]
    ErrorThresholdExceeded { ratio: Decimal, threshold: Decimal },
}

pub type Result<T> = std::result::Result<T, Error>;
