use crate::analysis::UrlStatistics;
use crate::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Marker in the template that is replaced with the JSON table
pub const TABLE_PLACEHOLDER: &str = "$table_json";

/// Fills the report template with statistics rows
pub struct ReportRenderer {
    template: PathBuf,
    max_rows: usize,
}

impl ReportRenderer {
    pub fn new(template: impl Into<PathBuf>, max_rows: usize) -> Self {
        Self {
            template: template.into(),
            max_rows,
        }
    }

    /// Render the report in memory
    pub fn render(&self, rows: &[UrlStatistics]) -> Result<String> {
        tracing::debug!("Loading report template from: {}", self.template.display());

        let template = fs::read_to_string(&self.template).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::TemplateNotFound(self.template.clone()),
            _ => Error::Io(e),
        })?;

        match template.matches(TABLE_PLACEHOLDER).count() {
            1 => {}
            0 => {
                return Err(Error::MalformedTemplate {
                    path: self.template.clone(),
                    reason: format!("missing {} placeholder", TABLE_PLACEHOLDER),
                });
            }
            n => {
                return Err(Error::MalformedTemplate {
                    path: self.template.clone(),
                    reason: format!("{} appears {} times", TABLE_PLACEHOLDER, n),
                });
            }
        }

        let rows = &rows[..rows.len().min(self.max_rows)];
        let table_json = serde_json::to_string(rows)?;

        Ok(template.replacen(TABLE_PLACEHOLDER, &table_json, 1))
    }

    /// Render the report and write it to `dest` as UTF-8.
    ///
    /// The content goes to a temporary file next to `dest` first, so `dest`
    /// only ever appears complete.
    pub fn render_to_file(&self, rows: &[UrlStatistics], dest: &Path) -> Result<()> {
        let html = self.render(rows)?;

        tracing::debug!("Writing report to: {}", dest.display());

        let write_error = |source: std::io::Error| Error::ReportWrite {
            path: dest.to_path_buf(),
            source,
        };

        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        // Temp files are created owner-only; the report takes the template's mode
        let permissions = fs::metadata(&self.template)?.permissions();

        let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
        file.write_all(html.as_bytes()).map_err(write_error)?;
        file.as_file()
            .set_permissions(permissions)
            .map_err(write_error)?;
        file.persist(dest).map_err(|e| write_error(e.error))?;

        tracing::info!(
            "Wrote report with {} rows to {}",
            rows.len().min(self.max_rows),
            dest.display()
        );

        Ok(())
    }
}
