//! Directory-backed render sink.
//!
//! Each opened printable is written to `<dir>/<jobId>-<fileName>`, so a
//! print viewer or spooler watching the directory can pick it up.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::JobId;
use crate::session::Printable;

use super::RenderSink;

// ============================================================================
// DirectorySink
// ============================================================================

/// Sink writing documents into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates a sink writing into `dir`. The directory is created on demand.
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path a printable is written to.
    #[must_use]
    pub fn path_for(&self, job_id: JobId, file_name: &str) -> PathBuf {
        self.dir.join(format!("{job_id}-{}", sanitize(job_id, file_name)))
    }
}

#[async_trait]
impl RenderSink for DirectorySink {
    async fn open(&self, printable: Printable) -> Result<()> {
        let path = self.path_for(printable.job_id, &printable.file_name);
        let job_id = printable.job_id;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::render(job_id, format!("{}: {e}", self.dir.display())))?;

        fs::write(&path, &printable.data)
            .await
            .map_err(|e| Error::render(job_id, format!("{}: {e}", path.display())))?;

        info!(%job_id, path = %path.display(), "Printable written");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Reduces a server-supplied name to a safe single path component.
fn sanitize(job_id: JobId, file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        debug!(%job_id, file_name, "Using fallback file name");
        format!("job-{job_id}.pdf")
    } else {
        cleaned
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize(JobId::new(1), "../../etc/passwd"), "passwd");
        assert_eq!(sanitize(JobId::new(1), "my invoice.pdf"), "my_invoice.pdf");
    }

    #[test]
    fn test_sanitize_fallback() {
        assert_eq!(sanitize(JobId::new(4), ""), "job-4.pdf");
        assert_eq!(sanitize(JobId::new(4), ".."), "job-4.pdf");
    }

    #[test]
    fn test_path_for() {
        let sink = DirectorySink::new("/spool");
        assert_eq!(
            sink.path_for(JobId::new(7), "a.pdf"),
            PathBuf::from("/spool/7-a.pdf")
        );
    }

    #[tokio::test]
    async fn test_open_writes_file() {
        let dir = TempDir::new().expect("tempdir");
        let sink = DirectorySink::new(dir.path().join("out"));
        let printable = Printable {
            job_id: JobId::new(7),
            file_name: "a.pdf".into(),
            data: b"%PDF".to_vec(),
        };

        sink.open(printable).await.expect("open");

        let written = std::fs::read(dir.path().join("out").join("7-a.pdf")).expect("read");
        assert_eq!(written, b"%PDF");
    }

    #[tokio::test]
    async fn test_open_reports_render_error() {
        let dir = TempDir::new().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").expect("write");

        // A regular file where the directory should be.
        let sink = DirectorySink::new(&blocker);
        let printable = Printable {
            job_id: JobId::new(2),
            file_name: "a.pdf".into(),
            data: Vec::new(),
        };

        let err = sink.open(printable).await.expect_err("should fail");
        assert!(matches!(err, Error::Render { job_id, .. } if job_id == JobId::new(2)));
    }
}
