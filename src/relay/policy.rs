use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Invalid protocol")]
    Scheme,
    #[error("Local/private IPs not allowed")]
    PrivateHost,
    #[error("Domain not allowed")]
    NotAllowListed,
}

/// Which upstream URLs the relay may fetch.
#[derive(Clone, Debug, Default)]
pub struct RelayPolicy {
    allowed_domains: Option<Vec<String>>,
    allow_private_hosts: bool,
}

impl RelayPolicy {
    pub fn new(allowed_domains: Option<Vec<String>>, allow_private_hosts: bool) -> Self {
        let allowed_domains = allowed_domains.map(|domains| {
            domains
                .into_iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        });
        Self {
            allowed_domains,
            allow_private_hosts,
        }
    }

    pub fn check(&self, url: &Url) -> Result<(), PolicyViolation> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PolicyViolation::Scheme);
        }
        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase())
            .ok_or(PolicyViolation::PrivateHost)?;

        if !self.allow_private_hosts && is_private_host(&host) {
            return Err(PolicyViolation::PrivateHost);
        }
        if let Some(domains) = &self.allowed_domains {
            let ok = domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")));
            if !ok {
                return Err(PolicyViolation::NotAllowListed);
            }
        }
        Ok(())
    }
}

/// `localhost` names and loopback, private, link-local, unspecified, or unique-local addresses.
pub fn is_private_host(host: &str) -> bool {
    let host = host.trim_end_matches('.');
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => is_private_v4(v4),
        Ok(IpAddr::V6(v6)) => is_private_v6(v6),
        Err(_) => false,
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xC0) == 64)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}
