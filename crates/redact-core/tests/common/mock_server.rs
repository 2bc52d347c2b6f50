//! Minimal HTTP/1.1 implementation of the redaction service for tests.
//!
//! Jobs are kept in memory. Behaviour is steered by the uploaded file name:
//! - contains `reject`: the upload is answered with 500
//! - contains `warn`: the job completes with one warning
//! - contains `fail`: the job ends in state `failed`
//! - contains `truncate`: the result download breaks off mid-body
//!
//! The first status poll of a job reports `active`, later ones the final
//! state. Downloads return `redacted <file name>` (archives are echoed back
//! unchanged) with a `Content-Disposition` naming the uploaded file.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// File name of the `file` part, for uploads.
    pub file_name: Option<String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct Job {
    file_name: String,
    content: Vec<u8>,
    polls: u32,
}

impl Job {
    fn warnings(&self) -> Vec<String> {
        if self.file_name.contains("warn") {
            vec!["malformed input".to_string()]
        } else {
            Vec::new()
        }
    }

    fn final_state(&self) -> &'static str {
        if self.file_name.contains("fail") {
            "failed"
        } else {
            "completed"
        }
    }
}

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, Job>,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone)]
pub struct MockRedact {
    pub url: String,
    state: Arc<Mutex<State>>,
}

impl MockRedact {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_matching(&self, method: &str, path_suffix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.ends_with(path_suffix))
            .collect()
    }

    pub fn uploads(&self) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.method == "POST").collect()
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }
}

/// Start the server on an ephemeral port. It runs until the process exits.
pub fn start() -> MockRedact {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State::default()));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    MockRedact {
        url: format!("http://127.0.0.1:{}/", port),
        state,
    }
}

struct Request {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut h = String::new();
        if reader.read_line(&mut h).ok()? == 0 {
            return None;
        }
        let h = h.trim_end();
        if h.is_empty() {
            break;
        }
        if let Some((k, v)) = h.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _): &&(String, String)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };

    let mut body = Vec::new();
    if let Some(len) = header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        body.resize(len, 0);
        reader.read_exact(&mut body).ok()?;
    } else if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).ok()?;
            let size = usize::from_str_radix(size_line.trim(), 16).ok()?;
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).ok()?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), parse_query(q)),
        None => (target.clone(), Vec::new()),
    };
    Some(Request { method, path, query, headers, body })
}

fn parse_query(q: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(q.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Returns (field name, file name, content) of every part.
fn multipart_parts(req: &Request) -> Vec<(String, Option<String>, Vec<u8>)> {
    let Some(boundary) = req
        .header("content-type")
        .and_then(|ct| ct.split("boundary=").nth(1))
        .map(|b| format!("--{}", b.trim_matches('"')))
    else {
        return Vec::new();
    };
    let body = &req.body;
    let mut positions = Vec::new();
    let mut i = 0;
    while let Some(p) = find(&body[i..], boundary.as_bytes()) {
        positions.push(i + p);
        i += p + boundary.len();
    }
    let mut parts = Vec::new();
    for w in positions.windows(2) {
        let raw = &body[w[0] + boundary.len()..w[1]];
        let Some(split) = find(raw, b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&raw[..split]).to_string();
        let mut content = raw[split + 4..].to_vec();
        if content.ends_with(b"\r\n") {
            content.truncate(content.len() - 2);
        }
        let field = attr(&head, "name=\"").unwrap_or_default();
        let file_name = attr(&head, "filename=\"");
        parts.push((field, file_name, content));
    }
    parts
}

fn attr(head: &str, key: &str) -> Option<String> {
    let start = head.find(key)? + key.len();
    let end = head[start..].find('"')? + start;
    Some(head[start..end].to_string())
}

fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

fn respond(stream: &mut TcpStream, status: u16, extra_headers: &[(&str, String)], body: &[u8]) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        423 => "Locked",
        500 => "Internal Server Error",
        _ => "Other",
    };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        reason,
        body.len()
    );
    for (k, v) in extra_headers {
        head.push_str(&format!("{}: {}\r\n", k, v));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn json(stream: &mut TcpStream, status: u16, value: serde_json::Value) {
    respond(
        stream,
        status,
        &[("Content-Type", "application/json".to_string())],
        value.to_string().as_bytes(),
    );
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&stream) else {
        return;
    };
    let parts = if req.method == "POST" { multipart_parts(&req) } else { Vec::new() };
    let upload = parts.iter().find(|(field, _, _)| field == "file").cloned();

    state.lock().unwrap().requests.push(RecordedRequest {
        method: req.method.clone(),
        path: req.path.clone(),
        query: req.query.clone(),
        headers: req.headers.clone(),
        file_name: upload.as_ref().and_then(|(_, name, _)| name.clone()),
    });

    let segments: Vec<&str> = req.path.trim_matches('/').split('/').collect();
    match (req.method.as_str(), segments.as_slice()) {
        ("POST", [_service, "v4", _output]) => {
            let Some((_, Some(file_name), content)) = upload else {
                return json(&mut stream, 422, serde_json::json!({"detail": "file part missing"}));
            };
            if file_name.contains("reject") {
                return respond(&mut stream, 500, &[], b"rejected by mock");
            }
            let id = Uuid::new_v4();
            state.lock().unwrap().jobs.insert(id, Job { file_name, content, polls: 0 });
            json(&mut stream, 200, serde_json::json!({ "output_id": id }));
        }
        ("GET", [_, "v4", _, id, "status"]) => {
            let polled = id.parse::<Uuid>().ok().and_then(|id| {
                let mut st = state.lock().unwrap();
                let job = st.jobs.get_mut(&id)?;
                job.polls += 1;
                Some(job.clone())
            });
            let Some(job) = polled else {
                return json(&mut stream, 404, serde_json::json!({"detail": "unknown job"}));
            };
            let state_name = if job.polls == 1 { "active" } else { job.final_state() };
            let mut body = serde_json::json!({
                "output_id": id,
                "state": state_name,
                "warnings": job.warnings(),
                "file_name": job.file_name,
            });
            if state_name == "failed" {
                body["error"] = serde_json::json!("mock failure");
            }
            json(&mut stream, 200, body);
        }
        ("GET", [_, "v4", _, id, "labels"]) => {
            let known = id.parse::<Uuid>().ok().is_some_and(|id| state.lock().unwrap().jobs.contains_key(&id));
            if !known {
                return json(&mut stream, 404, serde_json::json!({"detail": "unknown job"}));
            }
            json(
                &mut stream,
                200,
                serde_json::json!({"frames": [{"index": 1, "faces": [{"bounding_box": [1, 2, 3, 4], "score": 0.9}]}]}),
            );
        }
        ("GET", [_, "v4", _, id, "error"]) => {
            let job = id.parse::<Uuid>().ok().and_then(|id| state.lock().unwrap().jobs.get(&id).cloned());
            match job {
                Some(job) if job.final_state() == "failed" => {
                    json(&mut stream, 200, serde_json::json!({"error": "mock failure"}))
                }
                Some(_) => json(&mut stream, 200, serde_json::json!({})),
                None => json(&mut stream, 404, serde_json::json!({"detail": "unknown job"})),
            }
        }
        ("GET", [_, "v4", _, id]) => {
            let job = id.parse::<Uuid>().ok().and_then(|id| state.lock().unwrap().jobs.get(&id).cloned());
            let Some(job) = job else {
                return json(&mut stream, 404, serde_json::json!({"detail": "unknown job"}));
            };
            let ignore = req.query.iter().any(|(k, v)| k == "ignore_warnings" && v == "true");
            if !job.warnings().is_empty() && !ignore {
                return json(&mut stream, 423, serde_json::json!({"detail": "job has warnings"}));
            }
            let is_archive = job.file_name.ends_with(".tar");
            let body = if is_archive {
                job.content.clone()
            } else {
                format!("redacted {}", job.file_name).into_bytes()
            };
            let content_type = if is_archive { "application/x-tar" } else { "application/octet-stream" };
            let headers = [
                ("Content-Type", content_type.to_string()),
                ("Content-Disposition", format!("attachment; filename=\"{}\"", job.file_name)),
            ];
            if job.file_name.contains("truncate") {
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len() + 1000
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&body);
                return;
            }
            respond(&mut stream, 200, &headers, &body);
        }
        ("DELETE", [_, "v4", _, id]) => {
            let removed = id.parse::<Uuid>().ok().and_then(|id| state.lock().unwrap().jobs.remove(&id));
            match removed {
                Some(_) => json(&mut stream, 200, serde_json::json!({})),
                None => json(&mut stream, 404, serde_json::json!({"detail": "unknown job"})),
            }
        }
        _ => json(&mut stream, 404, serde_json::json!({"detail": "no route"})),
    }
}

/// Server that reads each request in full and never answers. The
/// connection stays open until the client hangs up. Returns the URL and the
/// number of requests received.
pub fn start_silent() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let _ = stream.set_read_timeout(Some(Duration::from_secs(30)));
                if read_request(&stream).is_some() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                let mut rest = [0u8; 1024];
                while matches!(stream.read(&mut rest), Ok(n) if n > 0) {}
            });
        }
    });
    (format!("http://127.0.0.1:{}/", port), received)
}

/// Server that drains request bodies `chunk` bytes at a time with `pause`
/// in between, then accepts the upload as a new job.
pub fn start_slow_reader(chunk: usize, pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            thread::spawn(move || {
                let _ = stream.set_read_timeout(Some(Duration::from_secs(30)));
                if drain_slowly(&stream, chunk, pause).is_none() {
                    return;
                }
                json(&mut stream, 200, serde_json::json!({ "output_id": Uuid::new_v4() }));
            });
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

/// Read the head, then a `Content-Length` body in paced chunks.
fn drain_slowly(stream: &TcpStream, chunk: usize, pause: Duration) -> Option<usize> {
    let mut reader = BufReader::new(stream);
    let mut len = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            if k.trim().eq_ignore_ascii_case("content-length") {
                len = v.trim().parse().ok()?;
            }
        }
    }
    let mut buf = vec![0u8; chunk];
    let mut left = len;
    while left > 0 {
        let want = left.min(chunk);
        reader.read_exact(&mut buf[..want]).ok()?;
        left -= want;
        thread::sleep(pause);
    }
    Some(len)
}
