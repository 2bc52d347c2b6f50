//! Detection labels, as returned by the labels endpoint and accepted as
//! custom labels input.

use serde::{Deserialize, Serialize};

use crate::{RedactError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelType {
    Face,
    LicensePlate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// `[x_min, y_min, x_max, y_max]` in pixels.
    pub bounding_box: [i64; 4],
    #[serde(default)]
    pub identity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameLabels {
    /// 1-based frame index.
    pub index: u64,
    #[serde(default)]
    pub faces: Vec<Label>,
    #[serde(default)]
    pub license_plates: Vec<Label>,
}

impl FrameLabels {
    pub fn new(index: u64) -> Self {
        Self { index, faces: Vec::new(), license_plates: Vec::new() }
    }

    pub fn push(&mut self, label: Label, kind: LabelType) {
        match kind {
            LabelType::Face => self.faces.push(label),
            LabelType::LicensePlate => self.license_plates.push(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLabels {
    pub frames: Vec<FrameLabels>,
}

/// Labels supplied by the caller for `redact_area` style jobs.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomLabels {
    /// JSON as read from a file or the command line; sent unchanged.
    RawJson(Vec<u8>),
    Parsed(JobLabels),
}

impl CustomLabels {
    /// Canonical JSON bytes for the multipart body.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            CustomLabels::RawJson(bytes) => Ok(bytes),
            CustomLabels::Parsed(labels) => serde_json::to_vec(&labels)
                .map_err(|e| RedactError::validation(format!("custom labels: {}", e))),
        }
    }
}

impl From<JobLabels> for CustomLabels {
    fn from(labels: JobLabels) -> Self {
        CustomLabels::Parsed(labels)
    }
}
