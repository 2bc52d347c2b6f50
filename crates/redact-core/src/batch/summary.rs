//! Aggregate counts of a batch run.

use std::fmt;
use std::time::Duration;

use crate::models::{JobState, JobStatus};

use super::ItemOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobsSummary {
    pub successful: usize,
    pub failed: usize,
    /// Jobs reporting at least one warning, successful or not.
    pub warnings: usize,
}

impl JobsSummary {
    pub fn add_status(&mut self, status: &JobStatus) {
        match status.state {
            JobState::Completed => self.successful += 1,
            JobState::Failed => self.failed += 1,
            JobState::Pending | JobState::Active => {}
        }
        if status.has_warnings() {
            self.warnings += 1;
        }
    }

    /// An item that raised instead of producing a status.
    pub fn add_error(&mut self) {
        self.failed += 1;
    }

    pub fn add_outcome(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Finished(status) => self.add_status(status),
            ItemOutcome::Skipped => {}
            ItemOutcome::Error(_) | ItemOutcome::NotStarted => self.add_error(),
        }
    }

    pub fn merge(&mut self, other: JobsSummary) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.warnings += other.warnings;
    }

    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a ItemOutcome>) -> Self {
        let mut s = Self::default();
        for o in outcomes {
            s.add_outcome(o);
        }
        s
    }
}

impl fmt::Display for JobsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "successful: {}, failed: {}, warnings: {}",
            self.successful, self.failed, self.warnings
        )
    }
}

/// `HH:MM:SS`; hours grow past 99 if needed.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
