//! SSRF guard: classifies destination hosts as safe/unsafe for outbound
//! tool-initiated HTTP calls. Resolves DNS before deciding so a public
//! hostname that rebinds to a private address is still caught.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SsrfGuardError {
    #[error("could not parse url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("url has no host")]
    NoHost,
    #[error("dns resolution failed for {host}: {source}")]
    ResolutionFailed { host: String, source: std::io::Error },
}

/// Fixed allow-list of (host, port) pairs treated as safe regardless of
/// DNS/IP classification — local companion services this process is
/// expected to talk to.
pub fn allow_list() -> &'static [(&'static str, u16)] {
    &[("localhost", 11434), ("127.0.0.1", 11434), ("localhost", 8888), ("127.0.0.1", 18789)]
}

pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.octets()[0] == 0
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true;
    }
    let segments = ip.segments();
    // fe80::/10 link-local
    if segments[0] & 0xffc0 == 0xfe80 {
        return true;
    }
    // fc00::/7 unique local
    if segments[0] & 0xfe00 == 0xfc00 {
        return true;
    }
    false
}

/// Parse `url`, check it against the allow-list, then resolve its host and
/// reject if any resolved address is private. Requires an async resolver so
/// this is the one guard entry point that isn't pure.
pub async fn is_url_safe(raw_url: &str) -> Result<bool, SsrfGuardError> {
    let parsed = Url::parse(raw_url)?;
    let host = parsed.host_str().ok_or(SsrfGuardError::NoHost)?.to_string();
    let port = parsed.port_or_known_default().unwrap_or(0);

    if allow_list().iter().any(|(h, p)| *h == host && *p == port) {
        tracing::debug!(host, port, "ssrf guard: allow-listed");
        return Ok(true);
    }

    let lookup_target = format!("{host}:{port}");
    let addrs: Vec<IpAddr> = match tokio::net::lookup_host(&lookup_target).await {
        Ok(iter) => iter.map(|a| a.ip()).collect(),
        Err(_) => {
            // Bare IP literals don't need DNS resolution.
            match host.parse::<IpAddr>() {
                Ok(ip) => vec![ip],
                Err(_) => {
                    tracing::warn!(host, "ssrf guard: could not resolve or parse host");
                    return Ok(false);
                }
            }
        }
    };

    if addrs.is_empty() {
        tracing::warn!(host, "ssrf guard: no addresses resolved");
        return Ok(false);
    }

    let safe = !addrs.iter().any(|ip| is_private_ip(*ip));
    if !safe {
        tracing::warn!(host, port, "ssrf guard: resolved address is private, rejecting");
    } else {
        tracing::debug!(host, port, "ssrf guard: resolved address is public, allowing");
    }
    Ok(safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ipv4_ranges_detected() {
        assert!(is_private_ip("127.0.0.1".parse().unwrap()));
        assert!(is_private_ip("10.0.0.5".parse().unwrap()));
        assert!(is_private_ip("172.16.0.5".parse().unwrap()));
        assert!(is_private_ip("192.168.1.5".parse().unwrap()));
        assert!(is_private_ip("169.254.0.5".parse().unwrap()));
        assert!(!is_private_ip("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn private_ipv6_ranges_detected() {
        assert!(is_private_ip("::1".parse().unwrap()));
        assert!(is_private_ip("fe80::1".parse().unwrap()));
        assert!(is_private_ip("fc00::1".parse().unwrap()));
        assert!(!is_private_ip("2001:4860:4860::8888".parse().unwrap()));
    }

    #[tokio::test]
    async fn allow_listed_local_service_is_safe() {
        assert!(is_url_safe("http://127.0.0.1:18789/health").await.unwrap());
    }

    #[tokio::test]
    async fn non_allow_listed_private_port_is_unsafe() {
        assert!(!is_url_safe("http://127.0.0.1:9999/secret").await.unwrap());
    }

    #[tokio::test]
    async fn literal_public_ip_is_safe() {
        assert!(is_url_safe("http://93.184.216.34/").await.unwrap());
    }
}
