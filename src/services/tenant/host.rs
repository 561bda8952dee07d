//! Host → tenant label.
use axum::http::{HeaderMap, Uri, header};

const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Effective host of a request, without port.
///
/// `X-Forwarded-Host` (first entry) wins over `Host`, which wins over the
/// authority of the request URI.
pub fn effective_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    let raw = headers
        .get(X_FORWARDED_HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .or_else(|| uri.host())?;

    let host = strip_port(raw);
    (!host.is_empty()).then_some(host)
}

/// First dot-delimited label of a host, lowercased (`Tenant-A.example.com` → `tenant-a`).
pub fn tenant_label(host: &str) -> Option<String> {
    host.split('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_ascii_lowercase)
}

fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn forwarded_host_wins() {
        let mut h = HeaderMap::new();
        h.insert(header::HOST, HeaderValue::from_static("localhost:8888"));
        h.insert(
            X_FORWARDED_HOST,
            HeaderValue::from_static("tenant-b.example.com, proxy.internal"),
        );

        assert_eq!(
            effective_host(&h, &uri("/api")),
            Some("tenant-b.example.com")
        );
    }

    #[test]
    fn host_header_then_uri_authority() {
        let mut h = HeaderMap::new();
        h.insert(header::HOST, HeaderValue::from_static("tenant-a.example.com:8443"));
        assert_eq!(
            effective_host(&h, &uri("/api")),
            Some("tenant-a.example.com")
        );

        assert_eq!(
            effective_host(&HeaderMap::new(), &uri("http://tenant-c.example.com/api")),
            Some("tenant-c.example.com")
        );
        assert_eq!(effective_host(&HeaderMap::new(), &uri("/api")), None);
    }

    #[test]
    fn label_is_first_segment() {
        assert_eq!(tenant_label("tenant-a.example.com").as_deref(), Some("tenant-a"));
        assert_eq!(tenant_label("localhost").as_deref(), Some("localhost"));
        assert_eq!(tenant_label("Tenant-A.Example.com").as_deref(), Some("tenant-a"));
        assert_eq!(tenant_label(".example.com"), None);
    }
}
