//! Single-item pipeline: submit, wait, download, clean up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::endpoint::{JobUpload, RedactClient};
use super::job::JobHandle;
use crate::files::{self, default_output_path, normalize_path};
use crate::models::{CustomLabels, JobArguments, JobState, JobStatus, OutputType, ServiceType};
use crate::{RedactError, Result};

/// Poll interval for image jobs.
pub const IMAGE_POLL_INTERVAL: Duration = Duration::from_millis(1500);
/// Poll interval for videos, archives and image folders.
pub const MEDIA_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Images finish in seconds, videos and archives take much longer.
pub fn default_poll_interval(input: &Path) -> Duration {
    if files::is_image(input) {
        IMAGE_POLL_INTERVAL
    } else {
        MEDIA_POLL_INTERVAL
    }
}

#[derive(Debug, Clone)]
pub struct RedactFileOptions {
    pub service: ServiceType,
    pub output_type: OutputType,
    pub job_args: JobArguments,
    pub licence_plate_custom_stamp: Option<PathBuf>,
    pub custom_labels: Option<CustomLabels>,
    pub ignore_warnings: bool,
    /// Skip items whose output already exists, without any request.
    pub skip_existing: bool,
    /// Delete the server-side job once the item is done.
    pub auto_delete_job: bool,
    /// Delete the local input after its result was written.
    pub auto_delete_input_file: bool,
    /// Defaults to [`default_poll_interval`] of the input.
    pub poll_interval: Option<Duration>,
}

impl RedactFileOptions {
    pub fn new(service: ServiceType, output_type: OutputType) -> Self {
        Self {
            service,
            output_type,
            job_args: JobArguments::default(),
            licence_plate_custom_stamp: None,
            custom_labels: None,
            ignore_warnings: false,
            skip_existing: true,
            auto_delete_job: true,
            auto_delete_input_file: false,
            poll_interval: None,
        }
    }
}

/// Redact one file into `output` (default `<stem>_redacted<ext>` beside
/// the input).
///
/// Returns `None` when skipped because the output exists, otherwise the
/// final job status. A `failed` job is returned as a status, not an error,
/// and nothing is downloaded for it.
pub fn redact_file(
    client: &RedactClient,
    input: &Path,
    output: Option<&Path>,
    opts: &RedactFileOptions,
) -> Result<Option<JobStatus>> {
    let input = normalize_path(input)?;
    let output = match output {
        Some(p) => normalize_path(p)?,
        None => default_output_path(&input, opts.output_type),
    };
    if opts.skip_existing && output.exists() {
        tracing::debug!("skipping because output already exists: {}", output.display());
        return Ok(None);
    }
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RedactError::io("create dir", parent, e))?;
    }
    tracing::debug!("redacting {} into {}", input.display(), output.display());

    let poll = opts.poll_interval.unwrap_or_else(|| default_poll_interval(&input));
    let outcome = run_job(client, &input, &output, poll, opts)?;

    if opts.auto_delete_input_file && outcome.written.is_some() {
        tracing::debug!("deleting input {}", input.display());
        if let Err(e) = std::fs::remove_file(&input) {
            tracing::warn!("could not delete input {}: {}", input.display(), e);
        }
    }
    Ok(Some(outcome.status))
}

/// Final status of a job and where its result went (`None` for failed jobs).
#[derive(Debug)]
pub(crate) struct JobOutcome {
    pub status: JobStatus,
    pub written: Option<PathBuf>,
}

/// Submit `input`, wait for the job, stream a completed result next to
/// `output`, then delete the job if asked to, whatever happened.
pub(crate) fn run_job(
    client: &RedactClient,
    input: &Path,
    output: &Path,
    poll: Duration,
    opts: &RedactFileOptions,
) -> Result<JobOutcome> {
    let mut upload = JobUpload::from_path(input).with_job_args(opts.job_args.clone());
    if let Some(stamp) = &opts.licence_plate_custom_stamp {
        upload = upload.with_licence_plate_custom_stamp(stamp);
    }
    if let Some(labels) = &opts.custom_labels {
        upload = upload.with_custom_labels(labels.clone());
    }
    let job = client.start_job(opts.service, opts.output_type, upload)?;
    tracing::debug!(output_id = %job.output_id(), "started job for {}", input.display());

    let outcome = finish(&job, input, output, poll, opts.ignore_warnings);
    if opts.auto_delete_job {
        if let Err(e) = job.delete() {
            tracing::warn!(output_id = %job.output_id(), "could not delete job: {}", e);
        }
    }
    outcome
}

fn finish(
    job: &JobHandle,
    input: &Path,
    output: &Path,
    poll: Duration,
    ignore_warnings: bool,
) -> Result<JobOutcome> {
    let status = job.wait_until_finished(poll)?;
    for warning in &status.warnings {
        tracing::warn!("warning for '{}': {}", input.display(), warning);
    }
    if status.state == JobState::Failed {
        tracing::error!(
            "job failed for '{}': {}",
            input.display(),
            status.error.as_deref().unwrap_or("no error message")
        );
        return Ok(JobOutcome { status, written: None });
    }
    let written = job.download_result_to_file(output, ignore_warnings)?;
    Ok(JobOutcome { status, written: Some(written) })
}
