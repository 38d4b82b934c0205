//! Backlog handoff.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use leadfeed_db::LeadRow;

/// Receives the undelivered backlog. Returning `Ok` is the confirmation that
/// lets the pipeline mark those rows delivered.
pub(crate) trait Reporter {
    fn deliver(&self, leads: &[LeadRow]) -> anyhow::Result<()>;
}

/// Writes the backlog as a pretty JSON array to `path`.
///
/// The file is written to a sibling temp file and renamed into place, so a
/// reader never sees a half-written report.
pub(crate) struct JsonReportWriter {
    path: PathBuf,
}

impl JsonReportWriter {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for JsonReportWriter {
    fn deliver(&self, leads: &[LeadRow]) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create report directory {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, leads).context("failed to serialize leads")?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to move report into {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), leads = leads.len(), "report written");
        Ok(())
    }
}
