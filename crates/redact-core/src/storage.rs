//! Result files written during streaming downloads.
//!
//! Bytes go to a hidden `.part` temp file next to the destination. The temp
//! file is renamed into place by [`ResultFile::finalize`] only after the
//! whole body arrived; dropping an unfinalized `ResultFile` deletes it, so a
//! destination path never holds a partial result.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::transport::ChunkSink;
use crate::{RedactError, Result};

/// Prefix and suffix of in-progress downloads.
pub const TEMP_PREFIX: &str = ".";
pub const TEMP_SUFFIX: &str = ".part";

#[derive(Debug)]
pub struct ResultFile {
    file: NamedTempFile,
    written: u64,
}

impl ResultFile {
    /// Create an empty temp file inside `dir`, which must be on the same
    /// filesystem as the final destination.
    pub fn create_in(dir: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| RedactError::io("create temp file in", dir, e))?;
        Ok(Self { file, written: 0 })
    }

    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .map_err(|e| RedactError::io("write", self.file.path(), e))?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Flush and atomically rename to `final_path`, replacing any existing file.
    pub fn finalize(mut self, final_path: &Path) -> Result<PathBuf> {
        self.file
            .flush()
            .map_err(|e| RedactError::io("flush", self.file.path(), e))?;
        self.file
            .persist(final_path)
            .map_err(|e| RedactError::io("rename temp file to", final_path, e.error))?;
        Ok(final_path.to_path_buf())
    }
}

impl ChunkSink for ResultFile {
    fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.write(data)
    }
}
