//! File classification by extension and directory enumeration.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::models::{InputType, OutputType};
use crate::{RedactError, Result};

pub const ARCHIVE_EXTENSIONS: &[&str] = &["tar"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "bmp", "png"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "mts", "ts", "webm"];
/// Frame formats accepted inside an image folder.
pub const FOLDER_FRAME_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];

/// Lowercase extension without the dot.
pub fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn has_extension(path: &Path, set: &[&str]) -> bool {
    extension(path).is_some_and(|e| set.contains(&e.as_str()))
}

pub fn is_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

pub fn is_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

pub fn is_archive(path: &Path) -> bool {
    has_extension(path, ARCHIVE_EXTENSIONS)
}

pub fn matches_input_type(path: &Path, input_type: InputType) -> bool {
    match input_type {
        InputType::Images => is_image(path),
        InputType::Videos => is_video(path),
        InputType::Archives => is_archive(path),
    }
}

/// MIME type sent with an upload part.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = extension(path)?;
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "mts" | "ts" => "video/mp2t",
        "webm" => "video/webm",
        "tar" => "application/x-tar",
        "json" => "application/json",
        _ => return None,
    })
}

/// Expand a leading `~` and make the path absolute. Symlinks are resolved
/// when the path exists.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };
    if let Ok(canonical) = expanded.canonicalize() {
        return Ok(canonical);
    }
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().map_err(|e| RedactError::io("read current dir", path, e))?;
    Ok(cwd.join(expanded))
}

/// Extension of the output for an input file and requested output type:
/// `.json` for labels, `.apng` for overlays of non-images, otherwise the
/// input's own extension (with dot, possibly empty).
pub fn output_extension(input: &Path, output_type: OutputType) -> String {
    match output_type {
        OutputType::Labels => ".json".to_string(),
        OutputType::Overlays if !is_image(input) => ".apng".to_string(),
        _ => input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
    }
}

/// Default output path for a single file: `<stem>_redacted<ext>` next to it.
pub fn default_output_path(input: &Path, output_type: OutputType) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    input.with_file_name(format!("{}_redacted{}", stem, output_extension(input, output_type)))
}

/// All regular files below `dir`, sorted.
pub fn files_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Directories with no subdirectory that contain at least one frame image.
pub fn leaf_image_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut leaves = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let mut has_subdir = false;
        let mut has_frame = false;
        let children = std::fs::read_dir(entry.path())
            .map_err(|e| RedactError::io("read dir", entry.path(), e))?;
        for child in children {
            let child = child.map_err(|e| RedactError::io("read dir", entry.path(), e))?;
            let path = child.path();
            if path.is_dir() {
                has_subdir = true;
                break;
            }
            has_frame |= has_extension(&path, FOLDER_FRAME_EXTENSIONS);
        }
        if !has_subdir && has_frame {
            leaves.push(entry.into_path());
        }
    }
    leaves.sort();
    Ok(leaves)
}

/// Frame images directly inside `dir`, sorted by file name.
pub fn frames_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| RedactError::io("read dir", dir, e))? {
        let path = entry.map_err(|e| RedactError::io("read dir", dir, e))?.path();
        if path.is_file() && has_extension(&path, FOLDER_FRAME_EXTENSIONS) {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

fn walk_error(root: &Path, e: walkdir::Error) -> RedactError {
    let path = e.path().unwrap_or(root).to_path_buf();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
    RedactError::io("walk", &path, source)
}
