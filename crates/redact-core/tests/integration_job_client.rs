//! Job client against the in-process mock service.

mod common;

use std::fs;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use common::{fast_transport, mock_server, transport_with_base_timeout};
use redact_core::cancel::CancelToken;
use redact_core::client::{redact_file, JobHandle, JobUpload, RedactClient, RedactFileOptions};
use redact_core::models::{JobArguments, JobState, OutputType, ServiceType};
use redact_core::retry::Clock;
use redact_core::transport::{Transport, TransportConfig};
use redact_core::RedactError;

const POLL: Duration = Duration::from_millis(10);

fn client(url: &str) -> RedactClient {
    let (transport, _) = fast_transport(Duration::from_secs(3));
    RedactClient::new(url, transport).unwrap()
}

fn start(client: &RedactClient, name: &str) -> JobHandle {
    client
        .start_job(
            ServiceType::Blur,
            OutputType::Images,
            JobUpload::from_bytes(Some(name), b"pixels".to_vec()),
        )
        .unwrap()
}

#[test]
fn small_upload_is_posted_once_with_base_timeout() {
    let server = mock_server::start();
    let client = client(&server.url);
    let args = JobArguments::builder().face(true).license_plate(false).build().unwrap();
    let upload = JobUpload::from_bytes(Some("street.jpg"), vec![0u8; 1024]).with_job_args(args);

    let job = client.start_job(ServiceType::Blur, OutputType::Images, upload).unwrap();

    let posts = server.uploads();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].path, "/blur/v4/images");
    assert_eq!(posts[0].file_name.as_deref(), Some("street.jpg"));
    assert_eq!(posts[0].query_value("face"), Some("true"));
    assert_eq!(posts[0].query_value("license_plate"), Some("false"));
    assert_eq!(client.transport().upload_timeout(1024), Duration::from_secs(10));
    assert_eq!(server.job_count(), 1);
    assert!(!job.output_id().is_nil());
}

#[test]
fn status_of_finished_job_does_not_change() {
    let server = mock_server::start();
    let client = client(&server.url);
    let job = start(&client, "a.jpg");

    let first = job.status().unwrap();
    assert_eq!(first.state, JobState::Active);
    let done = job.wait_until_finished(POLL).unwrap();
    assert_eq!(done.state, JobState::Completed);
    let again = job.status().unwrap();
    assert_eq!(again.state, done.state);
    assert_eq!(again.warnings, done.warnings);
    assert_eq!(again.output_id, job.output_id());
}

#[test]
fn warnings_block_download_unless_ignored() {
    let server = mock_server::start();
    let client = client(&server.url);
    let job = start(&client, "warn.jpg");

    let status = job.wait_until_finished(POLL).unwrap();
    assert!(status.has_warnings());

    let err = job.download_result(false).unwrap_err();
    assert!(err.is_blocked_by_warnings(), "unexpected error: {err}");

    let result = job.download_result(true).unwrap();
    assert_eq!(result.content, b"redacted warn.jpg");
    assert_eq!(result.file_name.as_deref(), Some("warn.jpg"));
    let downloads = server.requests_matching("GET", &job.output_id().to_string());
    assert_eq!(downloads.last().unwrap().query_value("ignore_warnings"), Some("true"));
}

#[test]
fn delete_twice_reports_not_found() {
    let server = mock_server::start();
    let client = client(&server.url);
    let job = start(&client, "a.jpg");

    job.delete().unwrap();
    let err = job.delete().unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert!(matches!(job.status(), Err(RedactError::Response { status: 404, .. })));
}

#[test]
fn labels_and_error_endpoints() {
    let server = mock_server::start();
    let client = client(&server.url);

    let job = start(&client, "a.jpg");
    let labels = job.labels().unwrap();
    assert_eq!(labels.frames.len(), 1);
    assert_eq!(labels.frames[0].faces[0].bounding_box, [1, 2, 3, 4]);

    let failed = start(&client, "fail.jpg");
    let status = failed.wait_until_finished(POLL).unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.error.as_deref(), Some("mock failure"));
    assert_eq!(failed.error().unwrap()["error"], "mock failure");
}

#[test]
fn attach_reaches_existing_job() {
    let server = mock_server::start();
    let client = client(&server.url);
    let job = start(&client, "a.jpg");
    let again = JobHandle::attach(client.clone(), job.service(), job.output_type(), job.output_id());
    assert_eq!(again.status().unwrap().output_id, job.output_id());
}

#[test]
fn auth_and_custom_headers_are_sent() {
    let server = mock_server::start();
    let client = client(&server.url)
        .with_custom_headers(vec![("X-Route".to_string(), "gpu".to_string())])
        .with_api_key(Some("secret".to_string()))
        .with_subscription_id(Some("sub-1".to_string()));
    let job = start(&client, "a.jpg");
    job.status().unwrap();

    for request in server.requests() {
        assert_eq!(request.header("api-key"), Some("secret"));
        assert_eq!(request.header("Subscription-Id"), Some("sub-1"));
        assert_eq!(request.header("X-Route"), Some("gpu"));
        assert_eq!(request.header("Accept"), Some("*/*"));
    }
}

#[test]
fn upload_without_extension_is_rejected_before_sending() {
    let server = mock_server::start();
    let client = client(&server.url);
    let err = client
        .start_job(
            ServiceType::Blur,
            OutputType::Images,
            JobUpload::from_bytes(Some("noext"), b"x".to_vec()),
        )
        .unwrap_err();
    assert!(matches!(err, RedactError::Validation(_)));
    assert!(server.requests().is_empty());
}

#[test]
fn server_error_is_a_response_error() {
    let server = mock_server::start();
    let client = client(&server.url);
    let err = client
        .start_job(
            ServiceType::Blur,
            OutputType::Images,
            JobUpload::from_bytes(Some("reject.jpg"), b"x".to_vec()),
        )
        .unwrap_err();
    match err {
        RedactError::Response { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, b"rejected by mock");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Status errors are answers, not network failures: no retry.
    assert_eq!(server.uploads().len(), 1);
}

#[test]
fn unreachable_service_gives_up_within_budget() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let budget = Duration::from_secs(5);
    let (transport, clock) = fast_transport(budget);
    let client = RedactClient::new(&format!("http://127.0.0.1:{port}/"), transport).unwrap();

    let err = client
        .start_job(
            ServiceType::Blur,
            OutputType::Images,
            JobUpload::from_bytes(Some("a.jpg"), b"x".to_vec()),
        )
        .unwrap_err();

    assert!(matches!(err, RedactError::Connect { .. }), "unexpected error: {err}");
    let slept: Duration = clock.sleeps().iter().sum();
    assert!(slept >= Duration::from_secs(1));
    assert!(slept <= budget);
    assert!(clock.now() <= budget);
}

#[test]
fn unanswered_upload_is_a_read_timeout_after_one_attempt() {
    let (url, received) = mock_server::start_silent();
    let (transport, clock) = transport_with_base_timeout(Duration::from_secs(1), Duration::from_secs(30));
    let client = RedactClient::new(&url, transport)
        .unwrap()
        .with_upload_timeout(Some(Duration::from_secs(1)));

    let started = Instant::now();
    let err = client
        .start_job(
            ServiceType::Blur,
            OutputType::Videos,
            JobUpload::from_bytes(Some("clip.mp4"), vec![7u8; 64 * 1024]),
        )
        .unwrap_err();

    assert!(matches!(err, RedactError::ReadTimeout { .. }), "unexpected error: {err}");
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert!(clock.sleeps().is_empty());
    assert!(started.elapsed() < Duration::from_secs(15));
}

#[test]
fn slow_but_steady_upload_is_not_cut_off() {
    // ~2.5 MB/s: the 8 MB body takes about three seconds to drain, well
    // past the one second base and upload timeouts.
    let url = mock_server::start_slow_reader(128 * 1024, Duration::from_millis(50));
    let (transport, clock) = transport_with_base_timeout(Duration::from_secs(1), Duration::from_secs(30));
    let client = RedactClient::new(&url, transport).unwrap();
    assert_eq!(client.transport().upload_timeout(8 * 1024 * 1024), Duration::from_secs(1));

    let started = Instant::now();
    let job = client
        .start_job(
            ServiceType::Blur,
            OutputType::Videos,
            JobUpload::from_bytes(Some("clip.mp4"), vec![7u8; 8 * 1024 * 1024]),
        )
        .unwrap();

    assert!(!job.output_id().is_nil());
    assert!(started.elapsed() > Duration::from_secs(2));
    assert!(clock.sleeps().is_empty());
}

#[test]
fn cancelled_transport_sends_nothing() {
    let server = mock_server::start();
    let cancel = CancelToken::new();
    cancel.cancel();
    let transport = Transport::new(TransportConfig::default()).with_cancel(cancel);
    let client = RedactClient::new(&server.url, Arc::new(transport)).unwrap();
    let err = client
        .start_job(
            ServiceType::Blur,
            OutputType::Images,
            JobUpload::from_bytes(Some("a.jpg"), b"x".to_vec()),
        )
        .unwrap_err();
    assert!(matches!(err, RedactError::Cancelled));
    assert!(server.requests().is_empty());
}

#[test]
fn redact_file_writes_result_and_deletes_job() {
    let server = mock_server::start();
    let client = client(&server.url);
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("photo.jpg");
    fs::write(&input, b"pixels").unwrap();
    let output = tmp.path().join("out/photo.jpg");
    let mut opts = RedactFileOptions::new(ServiceType::Blur, OutputType::Images);
    opts.poll_interval = Some(POLL);

    let status = redact_file(&client, &input, Some(&output), &opts).unwrap().unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(fs::read(&output).unwrap(), b"redacted photo.jpg");
    assert!(input.exists());
    assert_eq!(server.job_count(), 0);

    // Second run finds the output and does not contact the service.
    let before = server.requests().len();
    assert!(redact_file(&client, &input, Some(&output), &opts).unwrap().is_none());
    assert_eq!(server.requests().len(), before);
}

#[test]
fn redact_file_can_delete_input() {
    let server = mock_server::start();
    let client = client(&server.url);
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("photo.png");
    fs::write(&input, b"pixels").unwrap();
    let mut opts = RedactFileOptions::new(ServiceType::Blur, OutputType::Images);
    opts.poll_interval = Some(POLL);
    opts.auto_delete_input_file = true;

    redact_file(&client, &input, None, &opts).unwrap();
    assert!(!input.exists());
    assert_eq!(fs::read(tmp.path().join("photo_redacted.png")).unwrap(), b"redacted photo.png");
}

#[test]
fn failed_job_writes_nothing() {
    let server = mock_server::start();
    let client = client(&server.url);
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("fail.jpg");
    fs::write(&input, b"pixels").unwrap();
    let output = tmp.path().join("fail_out.jpg");
    let mut opts = RedactFileOptions::new(ServiceType::Blur, OutputType::Images);
    opts.poll_interval = Some(POLL);
    opts.auto_delete_input_file = true;

    let status = redact_file(&client, &input, Some(&output), &opts).unwrap().unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert!(!output.exists());
    assert!(input.exists());
}

#[test]
fn truncated_download_leaves_no_file_behind() {
    let server = mock_server::start();
    let client = client(&server.url);
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("truncate.jpg");
    fs::write(&input, b"pixels").unwrap();
    let out_dir = tmp.path().join("out");
    let output = out_dir.join("truncate.jpg");
    let mut opts = RedactFileOptions::new(ServiceType::Blur, OutputType::Images);
    opts.poll_interval = Some(POLL);

    let err = redact_file(&client, &input, Some(&output), &opts).unwrap_err();
    assert!(matches!(err, RedactError::Connect { .. }), "unexpected error: {err}");
    assert!(!output.exists());
    assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);
    // The job is cleaned up even though the download failed.
    assert_eq!(server.job_count(), 0);
}
