//! SSRF defense for outbound URLs.
//!
//! [`UrlGuard`] is a pure predicate checked before every outbound HTTP
//! request. It accepts only `http`/`https`, rejects `localhost`-style
//! hostnames, and rejects IP literals inside loopback, private, link-local,
//! unique-local, and unspecified ranges.
//!
//! Resolution is literal only: a hostname that is not an IP literal passes
//! the address checks without DNS resolution, so DNS re-resolution attacks
//! are not mitigated at this layer.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::Url;

use crate::error::{Error, Result};

/// URL guard configuration. The defaults block everything the adapters
/// should never talk to; the escape hatches exist for tests and trusted
/// environments.
#[derive(Debug, Clone, Default)]
pub struct UrlGuard {
    /// Allow private IPv4 ranges (10/8, 172.16/12, 192.168/16).
    pub allow_private_ips: bool,
    /// Allow loopback addresses (127.0.0.0/8, ::1) and `localhost`.
    pub allow_localhost: bool,
    /// Additional explicitly blocked addresses.
    pub blocked_ips: Vec<IpAddr>,
}

impl UrlGuard {
    fn is_blocked_ipv4(ip: &Ipv4Addr) -> bool {
        ip.is_loopback()
            || ip.is_private()
            || ip.is_link_local()
            // 0.0.0.0 can resolve to the local host on several platforms.
            || ip.is_unspecified()
    }

    /// fe80::/10
    fn is_link_local_ipv6(ip: &Ipv6Addr) -> bool {
        (ip.segments()[0] & 0xffc0) == 0xfe80
    }

    /// fc00::/7
    fn is_unique_local_ipv6(ip: &Ipv6Addr) -> bool {
        (ip.segments()[0] & 0xfe00) == 0xfc00
    }

    fn is_blocked_ipv6(ip: &Ipv6Addr) -> bool {
        ip.is_loopback()
            || ip.is_unspecified()
            || Self::is_link_local_ipv6(ip)
            || Self::is_unique_local_ipv6(ip)
            || ip
                .to_ipv4_mapped()
                .is_some_and(|v4| Self::is_blocked_ipv4(&v4))
    }

    fn is_blocked_ip(&self, ip: &IpAddr) -> bool {
        if self.blocked_ips.contains(ip) {
            return true;
        }
        if self.allow_localhost && ip.is_loopback() {
            return false;
        }
        if self.allow_private_ips && !ip.is_loopback() {
            return false;
        }
        match ip {
            IpAddr::V4(v4) => Self::is_blocked_ipv4(v4),
            IpAddr::V6(v6) => Self::is_blocked_ipv6(v6),
        }
    }

    fn is_localhost_name(host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == "localhost" || host == "localhost.localdomain" || host.ends_with(".localhost")
    }

    /// Validate a parsed URL. Returns `Err(Error::UrlNotAllowed)` with the
    /// rejection reason if the URL must not be fetched.
    pub fn validate(&self, url: &Url) -> Result<()> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::UrlNotAllowed(format!(
                    "scheme '{scheme}' not allowed (only http/https)"
                )))
            }
        }

        let host_str = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::UrlNotAllowed("URL has no host".to_string()))?;

        if !self.allow_localhost && Self::is_localhost_name(host_str) {
            return Err(Error::UrlNotAllowed(format!(
                "host '{host_str}' is a localhost alias"
            )));
        }

        // Literal resolution only: domains pass the address checks.
        let literal_ip = match url.host() {
            Some(url::Host::Ipv4(ip)) => Some(IpAddr::V4(ip)),
            Some(url::Host::Ipv6(ip)) => Some(IpAddr::V6(ip)),
            _ => None,
        };

        if let Some(ip) = literal_ip {
            if self.is_blocked_ip(&ip) {
                return Err(Error::UrlNotAllowed(format!(
                    "address {ip} is in a blocked range"
                )));
            }
        }

        Ok(())
    }

    /// Parse and validate a URL string in one step.
    pub fn validate_str(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::UrlNotAllowed(format!("invalid URL '{url}': {e}")))?;
        self.validate(&parsed)?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_allows_public_https() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("https://example.com/page")).is_ok());
    }

    #[test]
    fn test_allows_public_ipv4_literal() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://8.8.8.8/")).is_ok());
    }

    #[test]
    fn test_allows_public_ipv6_literal() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://[2001:4860:4860::8888]/")).is_ok());
    }

    #[test]
    fn test_rejects_file_scheme() {
        let guard = UrlGuard::default();
        let err = guard.validate(&url("file:///etc/passwd")).unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_rejects_ftp_scheme() {
        let guard = UrlGuard::default();
        let err = guard.validate(&url("ftp://example.com/")).unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_rejects_localhost_name() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://localhost/")).is_err());
        assert!(guard.validate(&url("http://localhost.localdomain/")).is_err());
        assert!(guard.validate(&url("http://api.localhost/")).is_err());
    }

    #[test]
    fn test_rejects_loopback_v4() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://127.0.0.1/")).is_err());
        assert!(guard.validate(&url("http://127.255.255.254/")).is_err());
    }

    #[test]
    fn test_rejects_loopback_v6() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://[::1]/")).is_err());
    }

    #[test]
    fn test_rejects_private_ranges() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://10.0.0.1/")).is_err());
        assert!(guard.validate(&url("http://172.16.0.1/")).is_err());
        assert!(guard.validate(&url("http://172.31.255.1/")).is_err());
        assert!(guard.validate(&url("http://192.168.1.1/")).is_err());
    }

    #[test]
    fn test_allows_adjacent_public_ranges() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://172.32.0.1/")).is_ok());
        assert!(guard.validate(&url("http://11.0.0.1/")).is_ok());
    }

    #[test]
    fn test_rejects_link_local() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://169.254.169.254/")).is_err());
        assert!(guard.validate(&url("http://[fe80::1]/")).is_err());
    }

    #[test]
    fn test_rejects_unique_local_v6() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://[fc00::1]/")).is_err());
        assert!(guard.validate(&url("http://[fd12::1]/")).is_err());
    }

    #[test]
    fn test_rejects_unspecified() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://0.0.0.0/")).is_err());
    }

    #[test]
    fn test_rejects_v4_mapped_private() {
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://[::ffff:10.0.0.1]/")).is_err());
    }

    #[test]
    fn test_domains_pass_without_resolution() {
        // Literal resolution only: a hostname pointing at a private address
        // is not caught here.
        let guard = UrlGuard::default();
        assert!(guard.validate(&url("http://intranet.corp/")).is_ok());
    }

    #[test]
    fn test_allow_localhost_flag() {
        let guard = UrlGuard {
            allow_localhost: true,
            ..UrlGuard::default()
        };
        assert!(guard.validate(&url("http://127.0.0.1/")).is_ok());
        assert!(guard.validate(&url("http://localhost/")).is_ok());
    }

    #[test]
    fn test_allow_private_flag_keeps_loopback_blocked() {
        let guard = UrlGuard {
            allow_private_ips: true,
            ..UrlGuard::default()
        };
        assert!(guard.validate(&url("http://192.168.1.1/")).is_ok());
        assert!(guard.validate(&url("http://127.0.0.1/")).is_err());
    }

    #[test]
    fn test_explicitly_blocked_ip() {
        let guard = UrlGuard {
            blocked_ips: vec!["93.184.216.34".parse().unwrap()],
            ..UrlGuard::default()
        };
        assert!(guard.validate(&url("http://93.184.216.34/")).is_err());
    }

    #[test]
    fn test_validate_str_rejects_garbage() {
        let guard = UrlGuard::default();
        let err = guard.validate_str("not a url").unwrap_err();
        assert!(matches!(err, Error::UrlNotAllowed(_)));
    }

    #[test]
    fn test_validate_str_returns_parsed_url() {
        let guard = UrlGuard::default();
        let parsed = guard.validate_str("https://example.com/path").unwrap();
        assert_eq!(parsed.host_str(), Some("example.com"));
    }
}
