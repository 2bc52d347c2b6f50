//! Work items of a batch run.

use std::path::{Path, PathBuf};

use crate::files;
use crate::models::{InputType, JobStatus};
use crate::Result;

/// One file (or image folder) to redact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Path below the input root, used for logging and the output layout.
    pub relative: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl BatchItem {
    fn new(relative: PathBuf, input_root: &Path, output_root: &Path) -> Self {
        Self {
            input: input_root.join(&relative),
            output: output_root.join(&relative),
            relative,
        }
    }
}

/// What became of one item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Finished(JobStatus),
    /// Output already existed.
    Skipped,
    /// Processing raised; the message was already logged.
    Error(String),
    /// Cancelled before a worker picked it up.
    NotStarted,
}

/// Files of `input_type` below `input_root`, sorted.
pub fn file_items(input_root: &Path, output_root: &Path, input_type: InputType) -> Result<Vec<BatchItem>> {
    Ok(files::files_in_dir(input_root)?
        .into_iter()
        .filter(|p| files::matches_input_type(p, input_type))
        .filter_map(|p| p.strip_prefix(input_root).ok().map(Path::to_path_buf))
        .map(|rel| BatchItem::new(rel, input_root, output_root))
        .collect())
}

/// Leaf directories with frames below `input_root`, sorted.
pub fn folder_items(input_root: &Path, output_root: &Path) -> Result<Vec<BatchItem>> {
    Ok(files::leaf_image_dirs(input_root)?
        .into_iter()
        .filter_map(|p| p.strip_prefix(input_root).ok().map(Path::to_path_buf))
        .map(|rel| BatchItem::new(rel, input_root, output_root))
        .collect())
}
