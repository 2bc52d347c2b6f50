//! `redact download <output_id> <output>` – fetch a finished job's result.

use std::path::Path;

use anyhow::{Context, Result};
use redact_core::client::RedactClient;

use super::attach;
use crate::cli::JobRef;

pub fn run_download(client: RedactClient, job: &JobRef, output: &Path, ignore_warnings: bool) -> Result<()> {
    let handle = attach(client, job);
    let written = handle
        .download_result_to_file(output, ignore_warnings)
        .with_context(|| format!("downloading result of job {}", job.output_id))?;
    println!("Wrote {}", written.display());
    Ok(())
}
