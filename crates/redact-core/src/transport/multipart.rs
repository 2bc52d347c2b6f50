//! Multipart body parts for uploads.

use std::path::{Path, PathBuf};

use curl::easy::Form;

use crate::files;
use crate::{RedactError, Result};

#[derive(Debug, Clone)]
pub enum PartSource {
    /// Streamed from disk by libcurl while uploading.
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// One file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub source: PartSource,
}

impl FilePart {
    /// Part read from `path`; file name and content type come from the path.
    pub fn from_path(field: &str, path: &Path) -> Self {
        Self {
            field: field.to_string(),
            file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            content_type: files::content_type_for(path).map(str::to_string),
            source: PartSource::Path(path.to_path_buf()),
        }
    }

    /// In-memory part. Content type is inferred from `file_name` when possible.
    pub fn from_bytes(field: &str, file_name: Option<&str>, data: Vec<u8>) -> Self {
        Self {
            field: field.to_string(),
            file_name: file_name.map(str::to_string),
            content_type: file_name
                .and_then(|n| files::content_type_for(Path::new(n)))
                .map(str::to_string),
            source: PartSource::Bytes(data),
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Size in bytes of the payload, used for timeout sizing.
    pub fn len(&self) -> Result<u64> {
        match &self.source {
            PartSource::Bytes(b) => Ok(b.len() as u64),
            PartSource::Path(p) => std::fs::metadata(p)
                .map(|m| m.len())
                .map_err(|e| RedactError::io("stat upload", p, e)),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Check the parts before any network call: at least one, each named or typed.
pub(crate) fn validate_parts(parts: &[FilePart]) -> Result<()> {
    if parts.is_empty() {
        return Err(RedactError::validation("multipart upload needs at least one file part"));
    }
    for part in parts {
        if part.file_name.is_none() && part.content_type.is_none() {
            return Err(RedactError::validation(format!(
                "part '{}' has neither a file name nor a content type",
                part.field
            )));
        }
    }
    Ok(())
}

/// Path named in errors about reading the upload: the first on-disk part,
/// else the first part's file name.
pub(crate) fn upload_source(parts: &[FilePart]) -> PathBuf {
    parts
        .iter()
        .find_map(|p| match &p.source {
            PartSource::Path(path) => Some(path.clone()),
            PartSource::Bytes(_) => None,
        })
        .or_else(|| parts.first().map(|p| PathBuf::from(p.file_name.as_deref().unwrap_or(&p.field))))
        .unwrap_or_default()
}

/// Build a fresh libcurl form. Called once per attempt since a form is
/// consumed by the handle.
pub(crate) fn build_form(parts: &[FilePart]) -> Result<Form> {
    let mut form = Form::new();
    for p in parts {
        let mut part = form.part(&p.field);
        match &p.source {
            PartSource::Path(path) => {
                part.file(path);
                if let Some(name) = &p.file_name {
                    part.filename(name);
                }
            }
            PartSource::Bytes(data) => {
                let name = p.file_name.as_deref().unwrap_or(p.field.as_str());
                part.buffer(name, data.clone());
            }
        }
        if let Some(ct) = &p.content_type {
            part.content_type(ct);
        }
        part.add()
            .map_err(|e| RedactError::validation(format!("multipart part '{}': {}", p.field, e)))?;
    }
    Ok(form)
}
