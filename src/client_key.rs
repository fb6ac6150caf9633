//! Client identity used to partition rate limit accounting.

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Key used when neither a proxy header nor a peer address is available
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client key for an inbound request.
///
/// The first `X-Forwarded-For` entry wins; otherwise the transport peer
/// address is used.
pub fn client_key(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    resolve_client_key(request.headers(), peer)
}

pub fn resolve_client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return forwarded.to_string();
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_header_takes_first_entry() {
        let mut request = Request::new(Body::empty());
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        assert_eq!(client_key(&request), "192.168.1.1");
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut request = Request::new(Body::empty());
        let addr: SocketAddr = "203.0.113.1:4567".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        assert_eq!(client_key(&request), "203.0.113.1");
    }

    #[test]
    fn test_blank_forwarded_header_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        let peer: SocketAddr = "198.51.100.7:80".parse().unwrap();

        assert_eq!(resolve_client_key(&headers, Some(peer)), "198.51.100.7");
    }

    #[test]
    fn test_unknown_without_any_source() {
        let request = Request::new(Body::empty());
        assert_eq!(client_key(&request), UNKNOWN_CLIENT);
    }
}
