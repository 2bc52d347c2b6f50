//! Failure of a single attempt, before the retry policy has looked at it.

use std::fmt;

use crate::RedactError;

#[derive(Debug)]
pub enum AttemptError {
    /// libcurl reported a failure while talking to the server.
    /// `connected` is true when the request got past connection setup.
    Curl { error: curl::Error, connected: bool },
    /// Anything else (local I/O, cancellation, upload read timeout). Never retried.
    Fatal(RedactError),
}

impl From<RedactError> for AttemptError {
    fn from(e: RedactError) -> Self {
        AttemptError::Fatal(e)
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Curl { error, .. } => write!(f, "{}", error),
            AttemptError::Fatal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AttemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Curl { error, .. } => Some(error),
            AttemptError::Fatal(e) => Some(e),
        }
    }
}
