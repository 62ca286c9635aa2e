//! Client identity extraction
//!
//! The client IP keys the rate limiter, so X-Forwarded-For is only trusted up to the
//! configured number of proxies.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};

use crate::state::AppState;

const UNKNOWN: &str = "unknown";

/// Extract and validate client IP from request headers
///
/// Order: X-Forwarded-For (honouring `trusted_proxy_count`), X-Real-IP, the socket
/// peer, and finally `"unknown"`.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| extract_from_forwarded_for(v, trusted_proxy_count))
    {
        return ip;
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| is_valid_ip(v))
    {
        return real_ip.to_string();
    }

    socket_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Pick the client entry of an X-Forwarded-For chain `client, proxy1, proxy2, ...`.
///
/// With N trusted proxies the last N entries are ours and the one before them is the
/// client. Chains too short for that fall back to the last entry.
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.last()?
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)?
    };

    is_valid_ip(candidate).then(|| candidate.to_string())
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

/// Client identity of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            socket_addr.as_ref(),
            state.config.trusted_proxy_count,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_single_forwarded_ip() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(extract_client_ip(&h, None, 1), "203.0.113.7");
    }

    #[test]
    fn test_trusted_proxy_chain() {
        let h = headers(&[("x-forwarded-for", "198.51.100.1, 203.0.113.7, 10.0.0.1")]);
        assert_eq!(extract_client_ip(&h, None, 1), "203.0.113.7");
        assert_eq!(extract_client_ip(&h, None, 2), "198.51.100.1");
        assert_eq!(extract_client_ip(&h, None, 0), "10.0.0.1");
    }

    #[test]
    fn test_invalid_forwarded_falls_back_to_real_ip() {
        let h = headers(&[
            ("x-forwarded-for", "not-an-ip"),
            ("x-real-ip", " 192.0.2.9 "),
        ]);
        assert_eq!(extract_client_ip(&h, None, 1), "192.0.2.9");
    }

    #[test]
    fn test_socket_fallback_then_unknown() {
        let addr: SocketAddr = "192.0.2.55:4000".parse().unwrap();
        assert_eq!(
            extract_client_ip(&HeaderMap::new(), Some(&addr), 1),
            "192.0.2.55"
        );
        assert_eq!(extract_client_ip(&HeaderMap::new(), None, 1), "unknown");
    }

    #[test]
    fn test_ipv6_accepted() {
        let h = headers(&[("x-forwarded-for", "2001:db8::1")]);
        assert_eq!(extract_client_ip(&h, None, 1), "2001:db8::1");
    }
}
