//! One service endpoint and job submission.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::headers::build_headers;
use super::job::JobHandle;
use crate::models::{CustomLabels, JobArguments, JobPostResponse, OutputType, ServiceType};
use crate::transport::{FilePart, Transport};
use crate::{RedactError, Result};

pub const API_VERSION: &str = "v4";

const FILE_FIELD: &str = "file";
const STAMP_FIELD: &str = "licence_plate_custom_stamp";
const LABELS_FIELD: &str = "custom_labels";

/// Prefix `http://` when no scheme is given and make sure the path ends
/// with `/`, so relative endpoint paths join below it.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let mut url = Url::parse(&with_scheme)
        .map_err(|e| RedactError::validation(format!("invalid redact URL '{}': {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Everything sent with one submission.
#[derive(Debug, Clone)]
pub struct JobUpload {
    file: FilePart,
    job_args: JobArguments,
    licence_plate_custom_stamp: Option<FilePart>,
    custom_labels: Option<CustomLabels>,
}

impl JobUpload {
    /// Upload streamed from `path`.
    pub fn from_path(path: &Path) -> Self {
        Self::new(FilePart::from_path(FILE_FIELD, path))
    }

    /// In-memory upload. A file name is required to submit.
    pub fn from_bytes(file_name: Option<&str>, data: Vec<u8>) -> Self {
        Self::new(FilePart::from_bytes(FILE_FIELD, file_name, data))
    }

    fn new(file: FilePart) -> Self {
        Self {
            file,
            job_args: JobArguments::default(),
            licence_plate_custom_stamp: None,
            custom_labels: None,
        }
    }

    pub fn with_job_args(mut self, job_args: JobArguments) -> Self {
        self.job_args = job_args;
        self
    }

    pub fn with_licence_plate_custom_stamp(mut self, path: &Path) -> Self {
        self.licence_plate_custom_stamp = Some(FilePart::from_path(STAMP_FIELD, path));
        self
    }

    pub fn with_custom_labels(mut self, labels: CustomLabels) -> Self {
        self.custom_labels = Some(labels);
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file.file_name.as_deref()
    }

    fn into_parts(self) -> Result<(Vec<FilePart>, JobArguments)> {
        match self.file.file_name.as_deref() {
            Some(name) if Path::new(name).extension().is_some() => {}
            Some(name) => {
                return Err(RedactError::validation(format!(
                    "file name '{}' has no extension to infer its type from",
                    name
                )))
            }
            None => return Err(RedactError::validation("upload has no file name")),
        }
        let mut parts = vec![self.file];
        parts.extend(self.licence_plate_custom_stamp);
        if let Some(labels) = self.custom_labels {
            parts.push(
                FilePart::from_bytes(LABELS_FIELD, Some("labels.json"), labels.into_bytes()?)
                    .with_content_type("application/json"),
            );
        }
        Ok((parts, self.job_args))
    }
}

/// Client for one service endpoint. Cheap to clone; clones share the transport.
#[derive(Debug, Clone)]
pub struct RedactClient {
    base_url: Url,
    api_key: Option<String>,
    subscription_id: Option<String>,
    custom_headers: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    upload_timeout: Option<Duration>,
    transport: Arc<Transport>,
}

impl RedactClient {
    pub fn new(redact_url: &str, transport: Arc<Transport>) -> Result<Self> {
        Ok(Self {
            base_url: normalize_url(redact_url)?,
            api_key: None,
            subscription_id: None,
            custom_headers: Vec::new(),
            headers: build_headers(None, None, &[]),
            upload_timeout: None,
            transport,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self.rebuild_headers();
        self
    }

    pub fn with_subscription_id(mut self, subscription_id: Option<String>) -> Self {
        self.subscription_id = subscription_id;
        self.rebuild_headers();
        self
    }

    pub fn with_custom_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.custom_headers = headers;
        self.rebuild_headers();
        self
    }

    /// Fixed upload timeout instead of one sized from the payload.
    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self
    }

    fn rebuild_headers(&mut self) {
        self.headers = build_headers(
            self.api_key.as_deref(),
            self.subscription_id.as_deref(),
            &self.custom_headers,
        );
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// `{base}/{service}/v4/{output_type}[/{segment}...]`
    pub(crate) fn endpoint(
        &self,
        service: ServiceType,
        output_type: OutputType,
        segments: &[&str],
    ) -> Result<String> {
        let mut relative = format!("{}/{}/{}", service, API_VERSION, output_type);
        for s in segments {
            relative.push('/');
            relative.push_str(s);
        }
        self.base_url
            .join(&relative)
            .map(String::from)
            .map_err(|e| RedactError::validation(format!("cannot build URL for {}: {}", relative, e)))
    }

    /// Submit `upload` and return a handle to the new job.
    ///
    /// Fails without a network call when the upload has no usable file
    /// name. A 200 without a job id is a decode error; any other status
    /// is a [`RedactError::Response`].
    pub fn start_job(
        &self,
        service: ServiceType,
        output_type: OutputType,
        upload: JobUpload,
    ) -> Result<JobHandle> {
        let (parts, job_args) = upload.into_parts()?;
        let url = self.endpoint(service, output_type, &[])?;
        let response = self.transport.post_multipart(
            &url,
            &job_args.to_query_pairs(),
            &parts,
            &self.headers,
            self.upload_timeout,
        )?;
        let posted: JobPostResponse = response.require_ok(|| "error posting job".to_string())?.json()?;
        tracing::debug!(output_id = %posted.output_id, %url, "job started");
        Ok(JobHandle::new(self.clone(), service, output_type, posted.output_id))
    }
}
