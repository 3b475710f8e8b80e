//! Upstream address resolution.
//!
//! nginx wants `Auth-Server` to be an address, not a hostname.

use std::net::{IpAddr, SocketAddr};

use tokio::net::lookup_host;
use tracing::warn;

/// Resolves `host` to the address sent in `Auth-Server`.
///
/// IP literals pass through. Names resolve to their first IPv4 address, or
/// their first address of any family if none is IPv4. If resolution fails
/// the name is returned unchanged.
pub async fn upstream_address(host: &str, port: u16) -> String {
    if host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }

    match lookup_host((host, port)).await {
        Ok(addrs) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            if let Some(ip) = preferred(&addrs) {
                return ip.to_string();
            }
            warn!(host, "upstream host resolved to no addresses");
        }
        Err(e) => warn!(host, error = %e, "cannot resolve upstream host"),
    }
    host.to_string()
}

fn preferred(addrs: &[SocketAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(SocketAddr::ip)
}
