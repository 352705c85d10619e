use crate::{Error, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Section of the config file that holds the analyzer settings
pub const CONFIG_SECTION: &str = "log_analyzer";

pub const REPORT_SIZE: &str = "REPORT_SIZE";
pub const REPORT_DIR: &str = "REPORT_DIR";
pub const LOG_DIR: &str = "LOG_DIR";
pub const OUTPUT: &str = "OUTPUT";
pub const REPORT_TEMPLATE: &str = "REPORT_TEMPLATE";
pub const ERROR_THRESHOLD: &str = "ERROR_THRESHOLD";

const KNOWN_KEYS: [&str; 6] = [
    REPORT_SIZE,
    REPORT_DIR,
    LOG_DIR,
    OUTPUT,
    REPORT_TEMPLATE,
    ERROR_THRESHOLD,
];

/// Settings for one analyzer run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum number of URL rows rendered into the report (default 1000)
    pub report_size: usize,
    /// Directory where reports are written (default `./reports`)
    pub report_dir: PathBuf,
    /// Directory scanned for nginx access logs (default `./log`)
    pub log_dir: PathBuf,
    /// Destination file for diagnostics; `None` means stderr
    pub output: Option<PathBuf>,
    /// HTML template holding the `$table_json` placeholder
    pub report_template: PathBuf,
    /// Abort when the share of unparseable lines exceeds this fraction.
    /// Unset by default, in which case the ratio is only logged.
    pub error_threshold: Option<Decimal>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_size: 1000,
            report_dir: PathBuf::from("./reports"),
            log_dir: PathBuf::from("./log"),
            output: None,
            report_template: PathBuf::from("./templates/report.html"),
            error_threshold: None,
        }
    }
}

impl Config {
    /// Overlay raw overrides on top of `defaults`.
    ///
    /// Neither input is modified. Values are validated here, so a
    /// successfully merged config is ready to drive a run.
    pub fn merge(defaults: &Config, overrides: &ConfigOverrides) -> Result<Config> {
        let mut config = defaults.clone();

        for (key, value) in overrides.iter() {
            match key {
                REPORT_SIZE => config.report_size = parse_report_size(value)?,
                REPORT_DIR => config.report_dir = PathBuf::from(value),
                LOG_DIR => config.log_dir = PathBuf::from(value),
                OUTPUT => config.output = non_empty_path(value),
                REPORT_TEMPLATE => config.report_template = PathBuf::from(value),
                ERROR_THRESHOLD => config.error_threshold = parse_error_threshold(value)?,
                _ => tracing::warn!("Ignoring unknown config key: {}", key),
            }
        }

        Ok(config)
    }
}

fn parse_report_size(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(Error::InvalidReportSize(value.to_string())),
    }
}

fn parse_error_threshold(value: &str) -> Result<Option<Decimal>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    match Decimal::from_str(value) {
        Ok(threshold) if threshold >= Decimal::ZERO && threshold <= Decimal::ONE => {
            Ok(Some(threshold))
        }
        _ => Err(Error::InvalidErrorThreshold(value.to_string())),
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// Raw `KEY = value` pairs read from the `[log_analyzer]` section of a
/// config file. Keys are upper-cased; values are kept as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    values: BTreeMap<String, String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single override
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_uppercase(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_uppercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Log destination, readable before the rest of the config is validated
    pub fn output(&self) -> Option<PathBuf> {
        self.get(OUTPUT).and_then(non_empty_path)
    }

    /// Read overrides from a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Reading config file from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;

        Self::parse(&content)
    }

    /// Parse INI-style content.
    ///
    /// Only the `[log_analyzer]` section is kept. Any syntax problem rejects
    /// the whole file, so callers never see a half-applied config.
    pub fn parse(content: &str) -> Result<Self> {
        let mut overrides = Self::new();
        let mut current_section: Option<&str> = None;
        let mut found_section = false;

        for (idx, raw_line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| {
                    Error::InvalidConfig(format!("line {}: unterminated section header", line_no))
                })?;
                let name = name.trim();
                found_section |= name == CONFIG_SECTION;
                current_section = Some(name);
                continue;
            }

            let section = current_section.ok_or_else(|| {
                Error::InvalidConfig(format!("line {}: key outside of any section", line_no))
            })?;

            let split_at = line.find(['=', ':']).ok_or_else(|| {
                Error::InvalidConfig(format!("line {}: expected KEY = value", line_no))
            })?;
            let key = line[..split_at].trim().to_uppercase();
            let value = line[split_at + 1..].trim();

            if key.is_empty() {
                return Err(Error::InvalidConfig(format!("line {}: empty key", line_no)));
            }

            if section != CONFIG_SECTION {
                continue;
            }

            if overrides.values.contains_key(&key) {
                return Err(Error::InvalidConfig(format!(
                    "line {}: duplicate key {}",
                    line_no, key
                )));
            }

            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::debug!("Config key {} is not recognized", key);
            }

            overrides.values.insert(key, value.to_string());
        }

        if !found_section {
            return Err(Error::InvalidConfig(format!(
                "missing [{}] section",
                CONFIG_SECTION
            )));
        }

        Ok(overrides)
    }
}
