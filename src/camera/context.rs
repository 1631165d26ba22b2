/// Secure-context check
///
/// Camera access is only attempted from an origin served over HTTPS or
/// from the local machine.

use std::net::IpAddr;

use url::{Host, Url};

/// Whether `origin` counts as a secure context.
///
/// An origin that does not parse is treated as insecure.
pub fn is_secure_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => is_secure_url(&url),
        Err(e) => {
            tracing::warn!("Unparsable origin {:?}: {}", origin, e);
            false
        }
    }
}

fn is_secure_url(url: &Url) -> bool {
    if url.scheme() == "https" {
        return true;
    }

    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_is_secure() {
        assert!(is_secure_origin("https://meters.example.com"));
        assert!(is_secure_origin("https://10.0.0.5:8443"));
    }

    #[test]
    fn test_local_http_is_secure() {
        assert!(is_secure_origin("http://localhost:3000"));
        assert!(is_secure_origin("http://LOCALHOST"));
        assert!(is_secure_origin("http://app.localhost:8080"));
        assert!(is_secure_origin("http://127.0.0.1:3000"));
        assert!(is_secure_origin("http://[::1]:3000"));
    }

    #[test]
    fn test_remote_http_is_insecure() {
        assert!(!is_secure_origin("http://meters.example.com"));
        assert!(!is_secure_origin("http://192.168.1.20:3000"));
        assert!(!is_secure_origin("not a url"));
    }
}
