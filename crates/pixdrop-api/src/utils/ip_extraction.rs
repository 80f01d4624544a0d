//! Client identity for the quota ledger.
//!
//! The ledger keys uploads by client IP. Behind `N` trusted proxies the client is the
//! entry `N` places from the end of `X-Forwarded-For`; with no trusted proxies only the
//! entry closest to us is used, since anything before it is client-controlled.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

/// Client identifier resolved from proxy headers or the socket address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Ok(ClientIp(client_ip(
            &parts.headers,
            socket,
            state.config.base.trusted_proxy_count,
        )))
    }
}

/// Resolve the client IP: `X-Forwarded-For`, then `X-Real-IP`, then the socket.
pub fn client_ip(
    headers: &HeaderMap,
    socket: Option<SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|chain| from_forwarded_chain(chain, trusted_proxy_count))
        .or_else(|| header_str(headers, "x-real-ip").and_then(parse_ip))
        .or_else(|| socket.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}

fn from_forwarded_chain(chain: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = chain
        .split(',')
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    // A chain no longer than the trusted hops is malformed; fall back to the nearest hop.
    let position = if trusted_proxy_count == 0 || hops.len() <= trusted_proxy_count {
        hops.len().checked_sub(1)?
    } else {
        hops.len() - trusted_proxy_count - 1
    };

    hops.get(position).copied().and_then(parse_ip)
}
