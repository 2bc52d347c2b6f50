//! CLI command handlers, one per file.

mod delete;
mod download;
mod redact_file;
mod redact_folder;
mod status;

pub use delete::run_delete;
pub use download::run_download;
pub use redact_file::run_redact_file;
pub use redact_folder::run_redact_folder;
pub use status::run_status;

use redact_core::client::{JobHandle, RedactClient};

use super::JobRef;

fn attach(client: RedactClient, job: &JobRef) -> JobHandle {
    JobHandle::attach(client, job.service, job.output_type, job.output_id)
}
