//! Quick-link URL normalization.
//!
//! Service links are usually saved while sitting at the Pi itself, so they
//! point at `localhost`. Viewed from another machine on the LAN those links
//! are dead; rewriting the loopback host to whatever host the dashboard was
//! reached through makes them work from any vantage point.

use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

fn is_local_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => name.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(addr) => *addr == Ipv4Addr::LOCALHOST || *addr == Ipv4Addr::UNSPECIFIED,
        Host::Ipv6(addr) => *addr == Ipv6Addr::LOCALHOST,
    }
}

/// Rewrite a loopback host in `url` to `page_host`.
///
/// Non-loopback URLs, relative or malformed strings, and empty input are
/// returned unchanged. Port, path, query and fragment are preserved.
pub fn normalize_link_url(url: &str, page_host: &str) -> String {
    if url.is_empty() || page_host.is_empty() {
        return url.to_string();
    }

    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let is_local = parsed.host().as_ref().is_some_and(is_local_host);
    if !is_local {
        return url.to_string();
    }

    match parsed.set_host(Some(page_host)) {
        Ok(()) => parsed.to_string(),
        Err(e) => {
            tracing::debug!("Cannot rewrite {} to host {}: {}", url, page_host, e);
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_localhost_to_page_host() {
        assert_eq!(
            normalize_link_url("http://localhost:8096/app", "192.168.1.50"),
            "http://192.168.1.50:8096/app"
        );
    }

    #[test]
    fn test_rewrites_all_loopback_spellings() {
        for url in [
            "http://127.0.0.1:9000/",
            "http://0.0.0.0:9000/",
            "http://[::1]:9000/",
            "http://LOCALHOST:9000/",
        ] {
            assert_eq!(
                normalize_link_url(url, "pi.lan"),
                "http://pi.lan:9000/",
                "failed for {}",
                url
            );
        }
    }

    #[test]
    fn test_keeps_query_and_fragment() {
        assert_eq!(
            normalize_link_url("https://localhost/a/b?x=1#top", "10.0.0.2"),
            "https://10.0.0.2/a/b?x=1#top"
        );
    }

    #[test]
    fn test_foreign_host_unchanged() {
        assert_eq!(
            normalize_link_url("http://example.com", "192.168.1.50"),
            "http://example.com"
        );
        assert_eq!(
            normalize_link_url("http://192.168.1.7:8123", "192.168.1.50"),
            "http://192.168.1.7:8123"
        );
    }

    #[test]
    fn test_malformed_and_empty_unchanged() {
        assert_eq!(normalize_link_url("not a url", "192.168.1.50"), "not a url");
        assert_eq!(normalize_link_url("/relative/path", "192.168.1.50"), "/relative/path");
        assert_eq!(normalize_link_url("", "192.168.1.50"), "");
    }

    #[test]
    fn test_empty_page_host_unchanged() {
        assert_eq!(
            normalize_link_url("http://localhost:8096/app", ""),
            "http://localhost:8096/app"
        );
    }
}
