//! Client address resolution for per-IP rate limiting.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the caller's IP.
///
/// Order: `X-Forwarded-For` (skipping `trusted_proxy_count` hops from the
/// right), `X-Real-IP`, the socket peer. Anything that does not parse as an
/// IP address is ignored. Falls back to `"unknown"`.
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| client_from_chain(chain, trusted_proxy_count));
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Pick the client out of `client, proxy1, ..., proxyN`.
///
/// With no trusted proxies, or a chain no longer than the trusted hops, only
/// the right-most (nearest) entry is used.
fn client_from_chain(chain: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = chain
        .split(',')
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    let index = if trusted_proxy_count == 0 || hops.len() <= trusted_proxy_count {
        hops.len().checked_sub(1)?
    } else {
        hops.len() - trusted_proxy_count - 1
    };

    hops.get(index)?.parse().ok()
}
