//! Map curl errors onto retry policy error kinds.

use super::policy::ErrorKind;

/// CURLE_WEIRD_SERVER_REPLY; the curl crate has no predicate for it.
const WEIRD_SERVER_REPLY: u32 = 8;

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_ssl_connect_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    if e.is_partial_file()
        || e.is_http2_error()
        || e.is_http2_stream_error()
        || e.code() == WEIRD_SERVER_REPLY
        || e.is_bad_content_encoding()
    {
        return ErrorKind::Protocol;
    }
    ErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    // Raw libcurl codes: 6 resolve host, 7 connect, 8 weird reply,
    // 18 partial file, 28 timeout, 3 malformed URL, 26 local read error.
    #[test]
    fn network_failures_are_retryable_kinds() {
        assert_eq!(classify_curl_error(&curl::Error::new(28)), ErrorKind::Timeout);
        assert_eq!(classify_curl_error(&curl::Error::new(7)), ErrorKind::Connection);
        assert_eq!(classify_curl_error(&curl::Error::new(6)), ErrorKind::Connection);
        assert_eq!(classify_curl_error(&curl::Error::new(18)), ErrorKind::Protocol);
        assert_eq!(classify_curl_error(&curl::Error::new(8)), ErrorKind::Protocol);
    }

    #[test]
    fn local_misuse_is_not_retried() {
        assert_eq!(classify_curl_error(&curl::Error::new(3)), ErrorKind::Other);
        // Failing to read our own upload source is not a network condition.
        assert_eq!(classify_curl_error(&curl::Error::new(26)), ErrorKind::Other);
    }
}
