//! Atomic file replacement.
//!
//! Every output is written to a temporary file in the destination directory
//! and renamed over the target only once fully written and synced. The
//! temporary file is removed on every other exit path, so an interrupted or
//! failed write never leaves a truncated file at the target path.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A file being written that replaces `target` on [`commit`](Self::commit).
#[derive(Debug)]
pub struct AtomicFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl AtomicFile {
    /// Start writing a replacement for `target`, creating parent directories.
    pub fn create(target: impl AsRef<Path>) -> io::Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = parent_dir(&target);
        fs::create_dir_all(&dir)?;

        let suffix = target
            .extension()
            .map(|ext| format!(".{}.part", ext.to_string_lossy()))
            .unwrap_or_else(|| ".part".to_string());
        let tmp = tempfile::Builder::new()
            .prefix(".hobart-")
            .suffix(&suffix)
            .tempfile_in(&dir)?;

        Ok(Self { tmp, target })
    }

    /// Path of the temporary file, for writers that need a path.
    pub fn temp_path(&self) -> &Path {
        self.tmp.path()
    }

    /// Final destination.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The open temporary file.
    pub fn file_mut(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    /// Flush, sync and rename the temporary file over the target.
    pub fn commit(mut self) -> io::Result<PathBuf> {
        self.tmp.as_file_mut().flush()?;
        self.tmp.as_file().sync_all()?;
        self.tmp.persist(&self.target).map_err(|e| e.error)?;
        Ok(self.target)
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tmp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tmp.flush()
    }
}

/// Write `bytes` to `target` atomically.
pub fn write_atomic(target: impl AsRef<Path>, bytes: &[u8]) -> io::Result<PathBuf> {
    let mut file = AtomicFile::create(target)?;
    file.write_all(bytes)?;
    file.commit()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
