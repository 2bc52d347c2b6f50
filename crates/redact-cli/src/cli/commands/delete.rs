//! `redact delete <output_id>` – remove a job from the server.

use anyhow::{Context, Result};
use redact_core::client::RedactClient;

use super::attach;
use crate::cli::JobRef;

pub fn run_delete(client: RedactClient, job: &JobRef) -> Result<()> {
    attach(client, job)
        .delete()
        .with_context(|| format!("deleting job {}", job.output_id))?;
    println!("Deleted job {}", job.output_id);
    Ok(())
}
