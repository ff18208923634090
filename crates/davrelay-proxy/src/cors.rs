//! CORS headers added to every relay response.

use http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// The fixed CORS header set.
pub static CORS_HEADERS: [(HeaderName, HeaderValue); 4] = [
    (
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    ),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    ),
    (
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,OPTIONS"),
    ),
    (
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("*"),
    ),
];

/// Insert the CORS headers, replacing any values already present.
///
/// Must run after upstream headers have been copied.
pub fn apply(headers: &mut HeaderMap) {
    for (name, value) in &CORS_HEADERS {
        headers.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_adds_all_four() {
        let mut headers = HeaderMap::new();
        apply(&mut headers);
        assert_eq!(headers.len(), CORS_HEADERS.len());
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(
            headers.get("access-control-allow-methods").unwrap(),
            "GET,HEAD,OPTIONS"
        );
    }

    #[test]
    fn test_apply_overrides_upstream_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://only.example.com"),
        );
        headers.append(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://other.example.com"),
        );
        headers.insert(header::CONTENT_RANGE, HeaderValue::from_static("bytes 0-9/100"));
        apply(&mut headers);

        let origins: Vec<_> = headers.get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN).iter().collect();
        assert_eq!(origins, vec!["*"]);
        assert_eq!(headers.get(header::CONTENT_RANGE).unwrap(), "bytes 0-9/100");
    }
}
