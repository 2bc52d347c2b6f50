//! HTTP transport shared by every job client.
//!
//! One [`Transport`] is built by the composition root and handed around as
//! `Arc<Transport>`. It keeps a pool of idle libcurl handles (so TCP/TLS
//! connections are reused across thousands of calls), applies the retry
//! policy to every request, and limits concurrent uploads.

mod multipart;
mod response;
mod slots;
mod timeout;
mod watchdog;

pub use multipart::{FilePart, PartSource};
pub use response::{Response, ResponseHeaders, StreamedResponse};
pub use slots::{SlotGuard, UploadSlots};
pub use timeout::upload_timeout;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::str;
use std::sync::{Arc, Mutex};
use std::io;
use std::time::{Duration, Instant};

use curl::easy::{Easy, Form, List};
use url::Url;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::config::RedactConfig;
use crate::retry::{classify_curl_error, run_with_retry, AttemptError, Clock, RetryPolicy, SystemClock};
use crate::storage::ResultFile;
use crate::{RedactError, Result};

use watchdog::{Expired, UploadWatchdog};

/// CURLE_OPERATION_TIMEDOUT, reported when the upload watchdog aborts.
const OPERATION_TIMEDOUT: u32 = 28;

/// Idle handles kept for reuse; extra handles are dropped on check-in.
const MAX_IDLE_HANDLES: usize = 32;

/// Receives body bytes of a successful streamed response.
pub trait ChunkSink {
    fn write_chunk(&mut self, data: &[u8]) -> Result<()>;
}

impl ChunkSink for Vec<u8> {
    fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Stall timeout of every transfer, and the base of the upload
    /// response timeout.
    pub base_timeout: Duration,
    pub timeout_per_gb: Duration,
    pub max_concurrent_uploads: usize,
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            base_timeout: Duration::from_secs(60),
            timeout_per_gb: Duration::from_secs(10),
            max_concurrent_uploads: 2,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&RedactConfig> for TransportConfig {
    fn from(cfg: &RedactConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            base_timeout: Duration::from_secs(cfg.base_timeout_secs),
            timeout_per_gb: Duration::from_secs(cfg.timeout_per_gb_secs),
            max_concurrent_uploads: cfg.max_concurrent_uploads,
            retry: RetryPolicy::from(&cfg.retry),
        }
    }
}

enum Method {
    Get,
    Delete,
    Post(Form),
}

#[derive(Clone, Copy)]
enum Limit {
    /// Abort only when no byte moved for this long.
    Stalled(Duration),
    /// Body phases may not stall for longer than `stall`; once the body is
    /// sent the response must start within `response_wait`.
    Upload { stall: Duration, response_wait: Duration },
}

/// Status, headers and non-2xx body of one exchange.
struct Exchange {
    status: u32,
    headers: ResponseHeaders,
    error_body: Vec<u8>,
}

pub struct Transport {
    config: TransportConfig,
    pool: Mutex<Vec<Easy>>,
    uploads: UploadSlots,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("uploads", &self.uploads)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        let uploads = UploadSlots::new(config.max_concurrent_uploads);
        Self {
            config,
            pool: Mutex::new(Vec::new()),
            uploads,
            clock: Arc::new(SystemClock::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Replace the clock used for backoff sleeps and poll intervals.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn upload_slots(&self) -> &UploadSlots {
        &self.uploads
    }

    /// Interruptible sleep on the transport's clock.
    pub fn sleep(&self, d: Duration) -> Result<()> {
        self.cancel.sleep(self.clock.as_ref(), d)
    }

    /// Upload timeout for a payload of `bytes`.
    pub fn upload_timeout(&self, bytes: u64) -> Duration {
        upload_timeout(bytes, self.config.base_timeout, self.config.timeout_per_gb)
    }

    /// Multipart POST. `params` are sent as query parameters, `parts` as the
    /// form body. Holds an upload slot for the whole call.
    ///
    /// Sending the body is bounded only by the stall timeout, so slow links
    /// still get through. Once the body is sent the response must start
    /// within a timeout sized from the payload, or `timeout` when given.
    /// Missing that deadline is [`RedactError::ReadTimeout`] and is not
    /// retried, since the server may already be working on the upload.
    pub fn post_multipart(
        &self,
        url: &str,
        params: &[(String, String)],
        parts: &[FilePart],
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Response> {
        multipart::validate_parts(parts)?;
        let timeout = match timeout {
            Some(t) => t,
            None => {
                let mut bytes = 0u64;
                for part in parts {
                    bytes += part.len()?;
                }
                self.upload_timeout(bytes)
            }
        };
        let full_url = with_query(url, params)?;

        let _slot = self.uploads.acquire(&self.cancel)?;
        let debug_id = Uuid::new_v4();
        tracing::debug!(%debug_id, url = %full_url, timeout_secs = timeout.as_secs_f64(), "posting upload");
        let limit = Limit::Upload { stall: self.config.base_timeout, response_wait: timeout };
        let response = self
            .buffered(&full_url, headers, limit, || Ok(Method::Post(multipart::build_form(parts)?)))
            .map_err(|e| local_read_failure(e, parts))?;
        tracing::debug!(%debug_id, status = response.status, "upload answered");
        Ok(response)
    }

    pub fn get(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Response> {
        let full_url = with_query(url, params)?;
        self.buffered(&full_url, headers, Limit::Stalled(self.config.base_timeout), || Ok(Method::Get))
    }

    pub fn delete(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        let full_url = with_query(url, &[])?;
        self.buffered(&full_url, headers, Limit::Stalled(self.config.base_timeout), || {
            Ok(Method::Delete)
        })
    }

    /// Streaming GET. `new_sink` is called once per attempt, so a retried
    /// download starts from an empty sink; the sink of a failed attempt is
    /// dropped. Only 2xx bodies reach the sink.
    pub fn get_stream<S, N>(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        mut new_sink: N,
    ) -> Result<StreamedResponse<S>>
    where
        S: ChunkSink,
        N: FnMut() -> Result<S>,
    {
        let full_url = with_query(url, params)?;
        let limit = Limit::Stalled(self.config.base_timeout);
        let result = run_with_retry(&self.config.retry, self.clock.as_ref(), &self.cancel, || {
            let mut sink = new_sink()?;
            let exchange = self.attempt(Method::Get, &full_url, headers, limit, &mut sink)?;
            Ok(StreamedResponse {
                url: full_url.clone(),
                status: exchange.status,
                headers: exchange.headers,
                sink,
                error_body: exchange.error_body,
            })
        });
        settle(&full_url, result)
    }

    /// Stream a 200 response into a temp file in `dir` and rename it to the
    /// path returned by `destination`, which sees the response headers.
    /// Any non-200 status becomes [`RedactError::Response`]; nothing is left
    /// on disk in that case or on any other failure.
    pub fn download_to_file<D>(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        dir: &Path,
        destination: D,
    ) -> Result<PathBuf>
    where
        D: FnOnce(&ResponseHeaders) -> PathBuf,
    {
        let streamed = self.get_stream(url, params, headers, || ResultFile::create_in(dir))?;
        if streamed.status != 200 {
            return Err(RedactError::Response {
                status: streamed.status,
                body: streamed.error_body,
                context: format!("download from {}", streamed.url),
            });
        }
        let target = destination(&streamed.headers);
        tracing::debug!(
            bytes = streamed.sink.written(),
            from = %streamed.sink.temp_path().display(),
            to = %target.display(),
            "download complete"
        );
        streamed.sink.finalize(&target)
    }

    fn buffered<M>(
        &self,
        url: &str,
        headers: &[(String, String)],
        limit: Limit,
        mut method: M,
    ) -> Result<Response>
    where
        M: FnMut() -> Result<Method>,
    {
        let result = run_with_retry(&self.config.retry, self.clock.as_ref(), &self.cancel, || {
            let mut body = Vec::new();
            let exchange = self.attempt(method()?, url, headers, limit, &mut body)?;
            let success = (200..300).contains(&exchange.status);
            Ok(Response {
                url: url.to_string(),
                status: exchange.status,
                headers: exchange.headers,
                body: if success { body } else { exchange.error_body },
            })
        });
        settle(url, result)
    }

    /// One request on a pooled handle.
    fn attempt(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        limit: Limit,
        sink: &mut dyn ChunkSink,
    ) -> Result<Exchange, AttemptError> {
        let mut easy = self.checkout();
        let result = perform(&mut easy, &self.config, method, url, headers, limit, sink);
        self.checkin(easy);
        result
    }

    fn checkout(&self) -> Easy {
        self.pool
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop())
            .unwrap_or_else(Easy::new)
    }

    fn checkin(&self, mut easy: Easy) {
        easy.reset();
        if let Ok(mut idle) = self.pool.lock() {
            if idle.len() < MAX_IDLE_HANDLES {
                idle.push(easy);
            }
        }
    }
}

fn configure(
    easy: &mut Easy,
    config: &TransportConfig,
    method: Method,
    url: &str,
    headers: &[(String, String)],
    limit: Limit,
) -> Result<(), curl::Error> {
    easy.reset();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(config.connect_timeout)?;
    match limit {
        Limit::Stalled(t) => {
            easy.low_speed_limit(1)?;
            easy.low_speed_time(t)?;
        }
        // Enforced by the progress callback.
        Limit::Upload { .. } => easy.progress(true)?,
    }
    match method {
        Method::Get => easy.get(true)?,
        Method::Delete => easy.custom_request("DELETE")?,
        Method::Post(form) => easy.httppost(form)?,
    }
    let mut list = List::new();
    // No `Expect: 100-continue` round trip before uploads.
    list.append("Expect:")?;
    for (name, value) in headers {
        list.append(&format!("{}: {}", name.trim(), value.trim()))?;
    }
    easy.http_headers(list)?;
    Ok(())
}

fn perform(
    easy: &mut Easy,
    config: &TransportConfig,
    method: Method,
    url: &str,
    headers: &[(String, String)],
    limit: Limit,
    sink: &mut dyn ChunkSink,
) -> Result<Exchange, AttemptError> {
    configure(easy, config, method, url, headers, limit)
        .map_err(|error| AttemptError::Curl { error, connected: false })?;

    let lines = RefCell::new(Vec::<String>::new());
    let mut error_body = Vec::new();
    let mut sink_error: Option<RedactError> = None;
    let watchdog = match limit {
        Limit::Upload { stall, response_wait } => {
            Some(RefCell::new(UploadWatchdog::new(stall, response_wait, Instant::now())))
        }
        Limit::Stalled(_) => None,
    };
    let performed = run_transfer(easy, &lines, &mut error_body, sink, &mut sink_error, watchdog.as_ref());

    if let Some(e) = sink_error {
        return Err(AttemptError::Fatal(e));
    }
    if let Err(error) = performed {
        let connected = easy.pretransfer_time().map(|d| !d.is_zero()).unwrap_or(false)
            || !lines.borrow().is_empty();
        return Err(match watchdog.and_then(|w| w.into_inner().expired()) {
            Some(Expired::AwaitingResponse) => AttemptError::Fatal(RedactError::ReadTimeout {
                url: url.to_string(),
                source: curl::Error::new(OPERATION_TIMEDOUT),
            }),
            Some(Expired::WhileSending) => {
                AttemptError::Curl { error: curl::Error::new(OPERATION_TIMEDOUT), connected }
            }
            None => AttemptError::Curl { error, connected },
        });
    }
    let status = easy.response_code().map_err(|e| AttemptError::Fatal(e.into()))?;
    let headers = response::parse_header_lines(&lines.into_inner());
    Ok(Exchange { status, headers, error_body })
}

/// Drive one transfer. Header lines are collected as they arrive so the
/// body callback can route bytes by status.
fn run_transfer(
    easy: &mut Easy,
    lines: &RefCell<Vec<String>>,
    error_body: &mut Vec<u8>,
    sink: &mut dyn ChunkSink,
    sink_error: &mut Option<RedactError>,
    watchdog: Option<&RefCell<UploadWatchdog>>,
) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    if let Some(watchdog) = watchdog {
        transfer.progress_function(move |_dl_total, dl_now, ul_total, ul_now| {
            let response_started = !lines.borrow().is_empty();
            watchdog
                .borrow_mut()
                .observe(Instant::now(), ul_total, ul_now, dl_now, response_started)
        })?;
    }
    transfer.header_function(|data| {
        if let Ok(s) = str::from_utf8(data) {
            lines.borrow_mut().push(s.trim_end().to_string());
        }
        true
    })?;
    transfer.write_function(|data| {
        let status = response::status_from_lines(&lines.borrow());
        if !status.is_some_and(|s| (200..300).contains(&s)) {
            error_body.extend_from_slice(data);
            return Ok(data.len());
        }
        match sink.write_chunk(data) {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                *sink_error = Some(e);
                // Short count aborts the transfer.
                Ok(0)
            }
        }
    })?;
    transfer.perform()
}

/// libcurl failing to read our own upload source is a local IO problem.
fn local_read_failure(err: RedactError, parts: &[FilePart]) -> RedactError {
    match err {
        RedactError::Curl(e) if e.is_read_error() => RedactError::io(
            "read upload source",
            &multipart::upload_source(parts),
            io::Error::other(e),
        ),
        other => other,
    }
}

/// Map the retry loop's final error onto the public taxonomy.
fn settle<T>(url: &str, result: std::result::Result<T, AttemptError>) -> Result<T> {
    match result {
        Ok(v) => Ok(v),
        Err(AttemptError::Fatal(e)) => Err(e),
        Err(AttemptError::Curl { error, .. }) if classify_curl_error(&error).is_retryable() => {
            Err(RedactError::Connect { url: url.to_string(), source: error })
        }
        Err(AttemptError::Curl { error, .. }) => Err(RedactError::Curl(error)),
    }
}

/// Append query parameters to `url`.
pub(crate) fn with_query(url: &str, params: &[(String, String)]) -> Result<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| RedactError::validation(format!("invalid URL '{}': {}", url, e)))?;
    if !params.is_empty() {
        parsed
            .query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(parsed.into())
}
