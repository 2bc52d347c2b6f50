//! `redact redact-file <input>` – redact one file or one folder of frames.
//!
//! `frames_per_job` is set in folder mode only.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use redact_core::client::{redact_file, RedactClient};
use redact_core::image_folder::redact_image_folder_in_batches;
use redact_core::models::JobState;

use crate::cli::JobArgs;

pub fn run_redact_file(
    client: &RedactClient,
    input: &Path,
    output: Option<&Path>,
    frames_per_job: Option<usize>,
    job: &JobArgs,
) -> Result<()> {
    let opts = job.file_options()?;
    let status = if let Some(frames_per_job) = frames_per_job {
        let output = output.map(Path::to_path_buf).unwrap_or_else(|| folder_output(input));
        redact_image_folder_in_batches(client, input, &output, &opts, frames_per_job)
            .with_context(|| format!("redacting frames in {}", input.display()))?
    } else {
        redact_file(client, input, output, &opts)
            .with_context(|| format!("redacting {}", input.display()))?
    };

    match status {
        None => println!("Skipped {}: output already exists", input.display()),
        Some(s) if s.state == JobState::Failed => {
            anyhow::bail!(
                "job {} failed: {}",
                s.output_id,
                s.error.as_deref().unwrap_or("no error message")
            );
        }
        Some(s) => {
            println!("Redacted {} (job {})", input.display(), s.output_id);
            for w in &s.warnings {
                println!("  warning: {w}");
            }
        }
    }
    Ok(())
}

/// `<dir>_redacted` next to the input folder.
fn folder_output(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frames".to_string());
    input.with_file_name(format!("{name}_redacted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_output_is_a_sibling() {
        assert_eq!(folder_output(Path::new("/data/seq1")), PathBuf::from("/data/seq1_redacted"));
    }
}
