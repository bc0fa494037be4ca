//! Persist run reports to disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use brainstorm_shared::{BrainstormError, Result, RunReport};

use crate::render::render_readable;

/// Where a report landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedReport {
    pub json_path: PathBuf,
    pub readable_path: PathBuf,
}

/// Destination for finished (or partial) run reports.
pub trait ReportSink {
    fn persist(&self, report: &RunReport) -> Result<PersistedReport>;
}

/// Writes `brainstorm_<YYYYmmdd_HHMMSS>_<run>.json` plus a `_readable.txt`
/// sibling under `results_dir`, creating the directory if needed.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    results_dir: PathBuf,
}

impl FileReportSink {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// File stem shared by both outputs. The run id suffix keeps runs started
    /// within the same second apart.
    pub fn file_stem(report: &RunReport) -> String {
        format!(
            "brainstorm_{}_{}",
            report.started_at.format("%Y%m%d_%H%M%S"),
            report.run_id.short()
        )
    }
}

impl ReportSink for FileReportSink {
    #[instrument(skip_all, fields(run_id = %report.run_id, dir = %self.results_dir.display()))]
    fn persist(&self, report: &RunReport) -> Result<PersistedReport> {
        std::fs::create_dir_all(&self.results_dir)
            .map_err(|e| BrainstormError::io(&self.results_dir, e))?;

        let stem = Self::file_stem(report);
        let json_path = self.results_dir.join(format!("{stem}.json"));
        let readable_path = self.results_dir.join(format!("{stem}_readable.txt"));

        let json = serde_json::to_string_pretty(report)
            .map_err(|e| BrainstormError::Serialization(format!("report JSON: {e}")))?;
        write_atomic(&json_path, &json)?;
        write_atomic(&readable_path, &render_readable(report))?;

        info!(
            json = %json_path.display(),
            readable = %readable_path.display(),
            complete = report.is_complete(),
            "report saved"
        );

        Ok(PersistedReport {
            json_path,
            readable_path,
        })
    }
}

/// Write via a dot-prefixed temp file and rename, so readers never see a
/// half-written report.
fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| BrainstormError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| BrainstormError::io(target, e))?;

    debug!(path = %target.display(), size = content.len(), "wrote report file");
    Ok(())
}
