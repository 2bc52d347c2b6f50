//! Handle to one submitted job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use super::endpoint::RedactClient;
use crate::models::{JobLabels, JobResult, JobStatus, OutputType, ServiceType};
use crate::Result;

/// A job that exists on the server.
///
/// Obtained from [`RedactClient::start_job`], or from [`JobHandle::attach`]
/// for a job id returned by an earlier submission. Every call targets that
/// one job; to retry a failed job, submit a new one.
#[derive(Debug)]
pub struct JobHandle {
    client: RedactClient,
    service: ServiceType,
    output_type: OutputType,
    output_id: Uuid,
}

impl JobHandle {
    pub(crate) fn new(
        client: RedactClient,
        service: ServiceType,
        output_type: OutputType,
        output_id: Uuid,
    ) -> Self {
        Self { client, service, output_type, output_id }
    }

    /// Re-attach to a job created earlier, e.g. after an upload whose
    /// response timed out.
    pub fn attach(
        client: RedactClient,
        service: ServiceType,
        output_type: OutputType,
        output_id: Uuid,
    ) -> Self {
        Self::new(client, service, output_type, output_id)
    }

    pub fn output_id(&self) -> Uuid {
        self.output_id
    }

    pub fn service(&self) -> ServiceType {
        self.service
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    fn url(&self, segments: &[&str]) -> Result<String> {
        let id = self.output_id.to_string();
        let mut all = vec![id.as_str()];
        all.extend_from_slice(segments);
        self.client.endpoint(self.service, self.output_type, &all)
    }

    fn download_params(ignore_warnings: bool) -> Vec<(String, String)> {
        vec![("ignore_warnings".to_string(), ignore_warnings.to_string())]
    }

    pub fn status(&self) -> Result<JobStatus> {
        let url = self.url(&["status"])?;
        self.client
            .transport()
            .get(&url, &[], self.client.headers())?
            .require_ok(|| format!("error getting status of job {}", self.output_id))?
            .json()
    }

    /// Poll until the job is completed or failed. Sleeps `poll_interval`
    /// between polls; only cancellation bounds the wait.
    pub fn wait_until_finished(&self, poll_interval: Duration) -> Result<JobStatus> {
        loop {
            let status = self.status()?;
            if !status.is_running() {
                return Ok(status);
            }
            tracing::trace!(output_id = %self.output_id, state = ?status.state, progress = ?status.progress, "job running");
            self.client.transport().sleep(poll_interval)?;
        }
    }

    /// Buffered download. A job with warnings answers 423 unless
    /// `ignore_warnings` is set.
    pub fn download_result(&self, ignore_warnings: bool) -> Result<JobResult> {
        let url = self.url(&[])?;
        let response = self
            .client
            .transport()
            .get(&url, &Self::download_params(ignore_warnings), self.client.headers())?
            .require_ok(|| format!("error downloading result of job {}", self.output_id))?;
        let media_type = response
            .headers
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = response.headers.file_name();
        Ok(JobResult { content: response.body, media_type, file_name })
    }

    /// Stream the result next to `path` and move it into place. The final
    /// extension comes from the server's file name, since the output
    /// container may differ from the input; the stem is taken from `path`.
    /// Returns the path actually written.
    pub fn download_result_to_file(&self, path: &Path, ignore_warnings: bool) -> Result<PathBuf> {
        let url = self.url(&[])?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let written = self.client.transport().download_to_file(
            &url,
            &Self::download_params(ignore_warnings),
            self.client.headers(),
            &dir,
            |headers| result_path(path, headers.file_name().as_deref()),
        )?;
        tracing::debug!(output_id = %self.output_id, path = %written.display(), "result written");
        Ok(written)
    }

    /// Delete the job and its result on the server. Deleting an already
    /// deleted job is a 404 [`crate::RedactError::Response`].
    pub fn delete(&self) -> Result<()> {
        let url = self.url(&[])?;
        self.client
            .transport()
            .delete(&url, self.client.headers())?
            .require_ok(|| format!("error deleting job {}", self.output_id))?;
        Ok(())
    }

    pub fn labels(&self) -> Result<JobLabels> {
        let url = self.url(&["labels"])?;
        self.client
            .transport()
            .get(&url, &[], self.client.headers())?
            .require_ok(|| format!("error getting labels of job {}", self.output_id))?
            .json()
    }

    /// Error details of a failed job, as the server reports them.
    pub fn error(&self) -> Result<serde_json::Value> {
        let url = self.url(&["error"])?;
        self.client
            .transport()
            .get(&url, &[], self.client.headers())?
            .require_ok(|| format!("error getting error of job {}", self.output_id))?
            .json()
    }
}

/// `path` with the extension of `server_name`; `path` unchanged when the
/// server gave no extension.
fn result_path(path: &Path, server_name: Option<&str>) -> PathBuf {
    match server_name.map(Path::new).and_then(Path::extension) {
        Some(ext) => path.with_extension(ext),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_extension_follows_server() {
        let p = Path::new("/out/clip.mp4");
        assert_eq!(result_path(p, Some("job.tar")), PathBuf::from("/out/clip.tar"));
        assert_eq!(result_path(p, Some("noext")), PathBuf::from("/out/clip.mp4"));
        assert_eq!(result_path(p, None), PathBuf::from("/out/clip.mp4"));
        assert_eq!(
            result_path(Path::new("/out/frames"), Some("x.tar")),
            PathBuf::from("/out/frames.tar")
        );
    }
}
