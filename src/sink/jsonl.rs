use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::record::CompilationRecord;
use super::{PersistenceSink, SinkError};
use crate::capture::CompilationContext;

/// Appends one JSON record per line to an artifact file.
///
/// The file is opened in append mode and every record is serialized in
/// full before the lock is taken, then written with a single `write_all`.
/// Several writers (in this process or others) may share one artifact.
pub struct JsonlArtifactWriter {
    path: PathBuf,
    file: Mutex<File>,
    written: AtomicU64,
}

impl JsonlArtifactWriter {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "opened capture artifact");
        Ok(Self {
            path,
            file: Mutex::new(file),
            written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this writer.
    pub fn records_written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    pub fn append_record(&self, record: &CompilationRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        drop(file);

        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PersistenceSink for JsonlArtifactWriter {
    fn append(&self, context: &CompilationContext) -> Result<(), SinkError> {
        let record = CompilationRecord::from_context(context)?;
        self.append_record(&record)?;
        tracing::debug!(id = %record.id, outcome = record.outcome.as_str(), "compilation persisted");
        Ok(())
    }
}
