//! Request headers: auth plus caller-supplied extras.

use crate::{RedactError, Result};

pub(crate) const ACCEPT: (&str, &str) = ("Accept", "*/*");
pub(crate) const API_KEY_HEADER: &str = "api-key";
pub(crate) const SUBSCRIPTION_ID_HEADER: &str = "Subscription-Id";

/// Parse one `key=value` pair. Only the first `=` splits, so values may
/// contain `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s.split_once('=').ok_or_else(|| {
        RedactError::validation(format!("invalid key-value pair '{}', expected key=value", s))
    })?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return Err(RedactError::validation(format!("empty key in '{}'", s)));
    }
    if value.is_empty() {
        return Err(RedactError::validation(format!("empty value for key '{}'", key)));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn parse_custom_headers<S: AsRef<str>>(pairs: &[S]) -> Result<Vec<(String, String)>> {
    pairs.iter().map(|p| parse_key_value(p.as_ref())).collect()
}

/// Full header set for every request. Custom headers come after `Accept`
/// and before the auth headers so they cannot replace credentials.
pub(crate) fn build_headers(
    api_key: Option<&str>,
    subscription_id: Option<&str>,
    custom: &[(String, String)],
) -> Vec<(String, String)> {
    let mut headers = vec![(ACCEPT.0.to_string(), ACCEPT.1.to_string())];
    for (k, v) in custom {
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(k));
        headers.push((k.clone(), v.clone()));
    }
    let auth = [(API_KEY_HEADER, api_key), (SUBSCRIPTION_ID_HEADER, subscription_id)];
    for (name, value) in auth {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.to_string(), v.to_string()));
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs() {
        assert_eq!(
            parse_key_value(" X-Route = gpu=2 ").unwrap(),
            ("X-Route".to_string(), "gpu=2".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=v").is_err());
        assert!(parse_key_value("k=").is_err());
        let all = parse_custom_headers(&["a=1", "b=2"]).unwrap();
        assert_eq!(all.len(), 2);
        assert!(parse_custom_headers(&["a=1", "broken"]).is_err());
    }

    #[test]
    fn auth_headers_are_optional() {
        let h = build_headers(None, None, &[]);
        assert_eq!(h, vec![("Accept".to_string(), "*/*".to_string())]);
        let h = build_headers(Some("k"), Some("s"), &[]);
        assert!(h.contains(&("api-key".to_string(), "k".to_string())));
        assert!(h.contains(&("Subscription-Id".to_string(), "s".to_string())));
    }

    #[test]
    fn custom_headers_cannot_replace_credentials() {
        let custom = vec![
            ("accept".to_string(), "application/json".to_string()),
            ("API-KEY".to_string(), "spoofed".to_string()),
        ];
        let h = build_headers(Some("real"), None, &custom);
        assert!(h.contains(&("accept".to_string(), "application/json".to_string())));
        assert!(!h.iter().any(|(k, _)| k == "Accept"));
        assert!(h.contains(&("api-key".to_string(), "real".to_string())));
        assert!(!h.iter().any(|(_, v)| v == "spoofed"));
    }
}
