//! Folder-as-video: a directory of frames is redacted as one sequence.
//!
//! The frames are packed into uncompressed tars (sorted by name) inside a
//! hidden temp directory of the input folder, submitted as archives, and
//! the returned archives are unpacked into the output folder. Long
//! sequences are split into batches of at most [`FRAMES_PER_JOB`] frames,
//! one job each. Output frames take the input frame names by sorted
//! position, since the service may rename them.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::client::{run_job, RedactClient, RedactFileOptions, MEDIA_POLL_INTERVAL};
use crate::files::{self, normalize_path};
use crate::models::JobStatus;
use crate::{RedactError, Result};

const TEMP_PREFIX: &str = ".redact-";

/// Most frames submitted in one job.
pub const FRAMES_PER_JOB: usize = 1500;

/// Redact the frames directly inside `input_dir` into `output_dir`, in
/// batches of [`FRAMES_PER_JOB`].
///
/// Returns `None` when skipped because `output_dir` already holds files.
pub fn redact_image_folder(
    client: &RedactClient,
    input_dir: &Path,
    output_dir: &Path,
    opts: &RedactFileOptions,
) -> Result<Option<JobStatus>> {
    redact_image_folder_in_batches(client, input_dir, output_dir, opts, FRAMES_PER_JOB)
}

/// [`redact_image_folder`] with at most `frames_per_job` frames per job.
///
/// Batches run one after another. The returned status is the last batch's
/// with the warnings of every batch; a failed batch stops the run and its
/// status is returned. Frames of batches finished before that stay in
/// `output_dir`.
pub fn redact_image_folder_in_batches(
    client: &RedactClient,
    input_dir: &Path,
    output_dir: &Path,
    opts: &RedactFileOptions,
    frames_per_job: usize,
) -> Result<Option<JobStatus>> {
    let input_dir = normalize_path(input_dir)?;
    let output_dir = normalize_path(output_dir)?;
    if input_dir == output_dir {
        return Err(RedactError::validation(format!(
            "input and output folder must differ: {}",
            input_dir.display()
        )));
    }
    if opts.skip_existing && dir_has_entries(&output_dir) {
        tracing::debug!("skipping because output folder exists: {}", output_dir.display());
        return Ok(None);
    }
    let frames = files::frames_in_dir(&input_dir)?;
    if frames.is_empty() {
        return Err(RedactError::validation(format!(
            "no jpeg or png frames in {}",
            input_dir.display()
        )));
    }
    // Checked up front so a late batch cannot trip over an existing frame.
    for frame in &frames {
        let target = output_dir.join(frame.file_name().unwrap_or_default());
        if target.exists() {
            return Err(RedactError::validation(format!(
                "refusing to overwrite existing frame {}",
                target.display()
            )));
        }
    }

    let staging_parent = output_dir.parent().unwrap_or(output_dir.as_path());
    std::fs::create_dir_all(staging_parent)
        .map_err(|e| RedactError::io("create dir", staging_parent, e))?;

    // Both temp dirs are removed on drop, whatever the outcome.
    let pack_dir = temp_dir_in(&input_dir)?;
    let unpack_dir = temp_dir_in(staging_parent)?;

    let poll = opts.poll_interval.unwrap_or(MEDIA_POLL_INTERVAL);
    let name = folder_name(&input_dir);
    let batches: Vec<&[PathBuf]> = frames.chunks(frames_per_job.max(1)).collect();
    let mut warnings = Vec::new();
    let mut last = None;
    for (i, batch) in batches.iter().enumerate() {
        let archive_name = if batches.len() == 1 {
            format!("{}.tar", name)
        } else {
            format!("{}_{:04}.tar", name, i)
        };
        let archive = pack_dir.path().join(archive_name);
        pack_frames(batch, &archive)?;
        tracing::debug!(
            frames = batch.len(),
            batch = i + 1,
            batches = batches.len(),
            "packed {} into {}",
            input_dir.display(),
            archive.display()
        );

        let result = unpack_dir.path().join(format!("result_{:04}.tar", i));
        let outcome = run_job(client, &archive, &result, poll, opts)?;
        if let Err(e) = std::fs::remove_file(&archive) {
            tracing::debug!("could not remove {}: {}", archive.display(), e);
        }
        warnings.extend(outcome.status.warnings.iter().cloned());
        let Some(written) = outcome.written else {
            return Ok(Some(outcome.status));
        };

        let extracted = unpack_dir.path().join(format!("frames_{:04}", i));
        unpack(&written, &extracted)?;
        place_frames(batch, &extracted, &output_dir)?;
        last = Some(outcome.status);
    }
    let Some(mut status) = last else {
        return Err(RedactError::validation("no batch was submitted"));
    };
    status.warnings = warnings;

    if opts.auto_delete_input_file {
        for frame in &frames {
            if let Err(e) = std::fs::remove_file(frame) {
                tracing::warn!("could not delete input {}: {}", frame.display(), e);
            }
        }
    }
    Ok(Some(status))
}

fn dir_has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn folder_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frames".to_string())
}

fn temp_dir_in(dir: &Path) -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(dir)
        .map_err(|e| RedactError::io("create temp dir in", dir, e))
}

/// Uncompressed tar of `frames` in the given order, stored under their
/// file names.
pub fn pack_frames(frames: &[PathBuf], archive: &Path) -> Result<()> {
    let file = File::create(archive).map_err(|e| RedactError::io("create", archive, e))?;
    let mut builder = tar::Builder::new(file);
    for frame in frames {
        let name = frame
            .file_name()
            .ok_or_else(|| RedactError::validation(format!("frame without name: {}", frame.display())))?;
        builder
            .append_path_with_name(frame, name)
            .map_err(|e| RedactError::io("add to archive", frame, e))?;
    }
    builder
        .into_inner()
        .and_then(|f| f.sync_all())
        .map_err(|e| RedactError::io("finish archive", archive, e))
}

fn unpack(archive: &Path, into: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| RedactError::io("open", archive, e))?;
    std::fs::create_dir_all(into).map_err(|e| RedactError::io("create dir", into, e))?;
    tar::Archive::new(file)
        .unpack(into)
        .map_err(|e| RedactError::io("unpack archive", archive, e))
}

/// Move extracted frames into `output_dir` under the input names. Nothing
/// is moved when the counts differ or a target already exists.
fn place_frames(inputs: &[PathBuf], extracted: &Path, output_dir: &Path) -> Result<()> {
    let results = files::files_in_dir(extracted)?;
    if results.len() != inputs.len() {
        return Err(RedactError::validation(format!(
            "expected {} redacted frames, archive contains {}",
            inputs.len(),
            results.len()
        )));
    }
    let mut moves = Vec::with_capacity(inputs.len());
    for (input, result) in inputs.iter().zip(&results) {
        let name = input.file_name().unwrap_or_default();
        let target = output_dir.join(name);
        if target.exists() {
            return Err(RedactError::validation(format!(
                "refusing to overwrite existing frame {}",
                target.display()
            )));
        }
        if result.file_name() != Some(name) {
            tracing::debug!("renaming {} to {}", result.display(), target.display());
        }
        moves.push((result, target));
    }
    std::fs::create_dir_all(output_dir).map_err(|e| RedactError::io("create dir", output_dir, e))?;
    for (from, to) in moves {
        std::fs::rename(from, &to).map_err(|e| RedactError::io("move frame to", &to, e))?;
    }
    Ok(())
}
