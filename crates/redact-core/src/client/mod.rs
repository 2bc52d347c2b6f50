//! Job client: submit a file, poll, download and delete its result.

mod endpoint;
mod headers;
mod job;
mod pipeline;

pub use endpoint::{normalize_url, JobUpload, RedactClient, API_VERSION};
pub use headers::{parse_custom_headers, parse_key_value};
pub use job::JobHandle;
pub use pipeline::{
    default_poll_interval, redact_file, RedactFileOptions, IMAGE_POLL_INTERVAL, MEDIA_POLL_INTERVAL,
};
pub(crate) use pipeline::run_job;
