//! Error taxonomy shared by the transport, the job client and the batch
//! orchestrator.
//!
//! Transient network failures never show up here until the retry budget is
//! spent; they then surface as [`RedactError::Connect`]. Application-level
//! HTTP failures are reported unchanged as [`RedactError::Response`].

use std::path::{Path, PathBuf};
use thiserror::Error;

/// HTTP status the service uses to block downloads of results with warnings.
pub const STATUS_BLOCKED_BY_WARNINGS: u32 = 423;

pub type Result<T, E = RedactError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RedactError {
    /// Network unreachable or timing out after the retry budget was exhausted.
    #[error("error communicating with {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: curl::Error,
    },

    /// Reading the response to an upload timed out. The upload may have
    /// succeeded server-side, so it is not retried.
    #[error(
        "timed out waiting for the upload response from {url}; the job may already exist, \
         check its status instead of uploading again"
    )]
    ReadTimeout {
        url: String,
        #[source]
        source: curl::Error,
    },

    /// Any non-2xx response. The body is kept verbatim for inspection.
    #[error("{context}: HTTP {status}: {}", String::from_utf8_lossy(.body))]
    Response {
        status: u32,
        body: Vec<u8>,
        context: String,
    },

    /// Malformed job arguments or local misuse detected before any request.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A cancel request was observed while waiting.
    #[error("operation cancelled")]
    Cancelled,

    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Local libcurl handle setup failed (not a network condition).
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
}

impl RedactError {
    pub fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        RedactError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        RedactError::Validation(msg.into())
    }

    /// HTTP status for `Response` errors.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            RedactError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for the expected 423 returned when warnings gate a download.
    pub fn is_blocked_by_warnings(&self) -> bool {
        self.status_code() == Some(STATUS_BLOCKED_BY_WARNINGS)
    }
}
