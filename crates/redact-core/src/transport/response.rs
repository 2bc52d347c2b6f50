//! Response types and header-line parsing.

use serde::de::DeserializeOwned;

use crate::content_disposition;
use crate::{RedactError, Result};

/// Response headers of the final HTTP exchange (after redirects and
/// `100 Continue` interim responses).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    /// Case-insensitive lookup of the first header named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    /// File name announced in `Content-Disposition`, if any.
    pub fn file_name(&self) -> Option<String> {
        self.get("content-disposition")
            .and_then(content_disposition::parse_filename)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse raw header lines as delivered by libcurl. A status line starts a
/// new header block, so only the last block survives.
pub(crate) fn parse_header_lines(lines: &[String]) -> ResponseHeaders {
    let mut entries = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.starts_with("HTTP/") {
            entries.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            entries.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    ResponseHeaders { entries }
}

/// Status code of the last status line seen so far.
pub(crate) fn status_from_lines(lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("HTTP/"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: String,
    pub status: u32,
    pub headers: ResponseHeaders,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize a JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|source| RedactError::Decode {
            url: self.url.clone(),
            source,
        })
    }

    /// Convert into a `Response` error unless the status is exactly 200,
    /// which is the only success code the service uses.
    pub fn require_ok(self, context: impl FnOnce() -> String) -> Result<Self> {
        if self.status == 200 {
            return Ok(self);
        }
        Err(RedactError::Response {
            status: self.status,
            body: self.body,
            context: context(),
        })
    }
}

/// Outcome of a streamed GET. The sink only receives body bytes when the
/// status is 2xx; otherwise the body is kept in `error_body`.
#[derive(Debug)]
pub struct StreamedResponse<S> {
    pub url: String,
    pub status: u32,
    pub headers: ResponseHeaders,
    pub sink: S,
    pub error_body: Vec<u8>,
}
