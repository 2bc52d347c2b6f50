//! Job status snapshots and results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// Completed and failed jobs never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Body of a successful job submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct JobPostResponse {
    pub output_id: Uuid,
}

/// Snapshot of a job as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub output_id: Uuid,
    pub state: JobState,
    #[serde(default)]
    pub start_timestamp: Option<f64>,
    #[serde(default)]
    pub end_timestamp: Option<f64>,
    #[serde(default)]
    pub estimated_time_to_completion: Option<f64>,
    /// Fraction in `[0, 1]`.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Set only when `state` is `failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Name of the result file, used to pick the output extension.
    #[serde(default)]
    pub file_name: Option<String>,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A result downloaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub content: Vec<u8>,
    pub media_type: String,
    pub file_name: Option<String>,
}
