//! Batch orchestrator: redact every eligible item below an input folder.
//!
//! Items are spread across one worker pool per endpoint. A failing item is
//! logged with its relative path and counted; it never stops its siblings.

mod item;
mod pool;
mod summary;

pub use item::{file_items, folder_items, BatchItem, ItemOutcome};
pub use pool::{assign_round_robin, run_pools};
pub use summary::{format_elapsed, JobsSummary};

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::client::{
    redact_file, RedactClient, RedactFileOptions, IMAGE_POLL_INTERVAL, MEDIA_POLL_INTERVAL,
};
use crate::files::normalize_path;
use crate::image_folder::redact_image_folder_in_batches;
use crate::models::{InputType, JobStatus};
use crate::{RedactError, Result};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub input_type: InputType,
    /// Per-item settings; `poll_interval` defaults by `input_type`.
    pub file: RedactFileOptions,
    /// Workers per endpoint.
    pub n_parallel_jobs: usize,
    /// Treat each leaf folder of frames as one video.
    pub video_as_image_folders: bool,
    /// Most frames per job in image-folder mode.
    pub frames_per_job: usize,
}

impl BatchOptions {
    fn poll_interval(&self) -> Duration {
        self.file.poll_interval.unwrap_or(match self.input_type {
            InputType::Images if !self.video_as_image_folders => IMAGE_POLL_INTERVAL,
            _ => MEDIA_POLL_INTERVAL,
        })
    }
}

/// Redact everything below `opts.input_dir` into the same layout under
/// `opts.output_dir`, using every client in `clients` as one endpoint.
///
/// Only setup problems (bad folders, no endpoint) are returned as errors;
/// per-item failures end up in the summary.
pub fn redact_folder(clients: &[RedactClient], opts: &BatchOptions) -> Result<JobsSummary> {
    let Some(first) = clients.first() else {
        return Err(RedactError::validation("at least one redact URL is required"));
    };
    let input_dir = normalize_path(&opts.input_dir)?;
    let output_dir = normalize_path(&opts.output_dir)?;
    if !input_dir.is_dir() {
        return Err(RedactError::validation(format!(
            "input folder does not exist: {}",
            input_dir.display()
        )));
    }
    if opts.video_as_image_folders && input_dir == output_dir {
        return Err(RedactError::validation("input and output folder must differ"));
    }
    std::fs::create_dir_all(&output_dir).map_err(|e| RedactError::io("create dir", &output_dir, e))?;
    tracing::info!("redacting files from {} ...", input_dir.display());
    if opts.file.auto_delete_input_file {
        tracing::warn!("auto-deletion on: input files are deleted once processed successfully");
    }

    let items = if opts.video_as_image_folders {
        folder_items(&input_dir, &output_dir)?
    } else {
        file_items(&input_dir, &output_dir, opts.input_type)?
    };
    let what = if opts.video_as_image_folders { "image folders".to_string() } else { opts.input_type.to_string() };
    tracing::info!("found {} {} to process", items.len(), what);
    tracing::info!(
        "starting {} parallel jobs for each of {} endpoint(s)",
        opts.n_parallel_jobs.max(1),
        clients.len()
    );
    if clients.len() > 1 {
        tracing::debug!(
            "endpoints: {}",
            clients.iter().map(|c| c.base_url().as_str()).collect::<Vec<_>>().join(", ")
        );
    }

    let mut file_opts = opts.file.clone();
    file_opts.poll_interval = Some(opts.poll_interval());
    let started = Instant::now();
    let cancel = first.transport().cancel_token().clone();
    let results = run_pools(clients, items, opts.n_parallel_jobs, &cancel, |client, item| {
        let result = process_item(client, item, &file_opts, opts);
        outcome_of(item, result)
    });

    let summary = JobsSummary::from_outcomes(results.iter().map(|(_, o)| o));
    let skipped = results.iter().filter(|(_, o)| matches!(o, ItemOutcome::Skipped)).count();
    let not_started = results.iter().filter(|(_, o)| matches!(o, ItemOutcome::NotStarted)).count();
    if not_started > 0 {
        tracing::warn!("{} item(s) not started because the run was cancelled", not_started);
    }
    tracing::info!(
        "{} (skipped: {}), elapsed {}",
        summary,
        skipped,
        format_elapsed(started.elapsed())
    );
    Ok(summary)
}

fn process_item(
    client: &RedactClient,
    item: &BatchItem,
    file_opts: &RedactFileOptions,
    opts: &BatchOptions,
) -> Result<Option<JobStatus>> {
    if opts.video_as_image_folders {
        redact_image_folder_in_batches(client, &item.input, &item.output, file_opts, opts.frames_per_job)
    } else {
        redact_file(client, &item.input, Some(&item.output), file_opts)
    }
}

fn outcome_of(item: &BatchItem, result: Result<Option<JobStatus>>) -> ItemOutcome {
    let rel = item.relative.display();
    match result {
        Ok(Some(status)) => ItemOutcome::Finished(status),
        Ok(None) => ItemOutcome::Skipped,
        Err(e) => {
            match &e {
                RedactError::Connect { .. } => tracing::error!("connection error while redacting {}: {}", rel, e),
                RedactError::Response { .. } => tracing::error!("unexpected response while redacting {}: {}", rel, e),
                RedactError::Cancelled => tracing::warn!("cancelled while redacting {}", rel),
                _ => tracing::error!("error while redacting {}: {}", rel, e),
            }
            ItemOutcome::Error(e.to_string())
        }
    }
}
