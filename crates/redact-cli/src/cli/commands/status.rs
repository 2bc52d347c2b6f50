//! `redact status <output_id>` – show the state of a job.

use anyhow::{Context, Result};
use redact_core::client::RedactClient;

use super::attach;
use crate::cli::JobRef;

pub fn run_status(client: RedactClient, job: &JobRef) -> Result<()> {
    let handle = attach(client, job);
    let s = handle
        .status()
        .with_context(|| format!("getting status of job {}", job.output_id))?;

    println!("{:<10} {}", "JOB", s.output_id);
    println!("{:<10} {}", "STATE", format!("{:?}", s.state).to_lowercase());
    if let Some(p) = s.progress {
        println!("{:<10} {:.0}%", "PROGRESS", p * 100.0);
    }
    if let Some(eta) = s.estimated_time_to_completion {
        println!("{:<10} {:.0}s", "ETA", eta);
    }
    if let Some(n) = s.total_frames {
        println!("{:<10} {}", "FRAMES", n);
    }
    for w in &s.warnings {
        println!("{:<10} {}", "WARNING", w);
    }
    if let Some(e) = &s.error {
        println!("{:<10} {}", "ERROR", e);
    }
    Ok(())
}
