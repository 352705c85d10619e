use super::{LogDescriptor, LogFormat};
use crate::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Split};
use std::path::Path;

pub struct LogReader;

impl LogReader {
    /// Open a log for line-by-line reading, decompressing gzip transparently.
    ///
    /// Every call starts from the beginning of the file.
    pub fn open(log: &LogDescriptor) -> Result<LogLines> {
        Self::open_path(&log.path, log.format)
    }

    pub fn open_path(path: &Path, format: LogFormat) -> Result<LogLines> {
        tracing::debug!("Opening {} log: {}", format.as_str(), path.display());

        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = match format {
            LogFormat::Plain => Box::new(BufReader::new(file)),
            LogFormat::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        };

        Ok(LogLines {
            inner: reader.split(b'\n'),
        })
    }
}

/// Forward-only sequence of log lines.
///
/// Lines are decoded as UTF-8 with invalid bytes replaced, and the line
/// terminator is stripped. The file handle is released when this is dropped.
pub struct LogLines {
    inner: Split<Box<dyn BufRead>>,
}

impl Iterator for LogLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = match self.inner.next()? {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(e.into())),
        };

        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(Ok(line))
    }
}
