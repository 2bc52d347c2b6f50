//! `redact redact-folder <in> <out>` – batch run over a folder tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use redact_core::batch::{redact_folder, BatchOptions};
use redact_core::client::RedactClient;
use redact_core::models::InputType;

use crate::cli::JobArgs;

#[allow(clippy::too_many_arguments)]
pub fn run_redact_folder(
    clients: &[RedactClient],
    input_dir: PathBuf,
    output_dir: PathBuf,
    input_type: InputType,
    n_parallel_jobs: usize,
    video_as_image_folders: bool,
    frames_per_job: usize,
    job: &JobArgs,
) -> Result<()> {
    let opts = BatchOptions {
        input_dir,
        output_dir,
        input_type,
        file: job.file_options()?,
        n_parallel_jobs: n_parallel_jobs.max(1),
        video_as_image_folders,
        frames_per_job: frames_per_job.max(1),
    };
    let summary = redact_folder(clients, &opts)
        .with_context(|| format!("redacting folder {}", opts.input_dir.display()))?;
    println!("{summary}");
    if clients.first().is_some_and(|c| c.transport().cancel_token().is_cancelled()) {
        anyhow::bail!("interrupted");
    }
    Ok(())
}
