//! Request metadata recorded with each click
//!
//! The service usually runs behind a reverse proxy or CDN. Forwarding
//! headers are only believed when the socket peer is one of the configured
//! trusted proxies; otherwise the peer address is the client.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::{DateTime, Utc};

use crate::model::ClickEvent;

const COUNTRY_HEADERS: &[&str] = &["cf-ipcountry", "x-vercel-ip-country", "x-country-code"];
const CITY_HEADERS: &[&str] = &["cf-ipcity", "x-vercel-ip-city"];

const MAX_HEADER_LEN: usize = 512;

/// Socket peer address, when the server was started with connect info
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAddr(pub Option<SocketAddr>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0),
        ))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn bounded(value: &str) -> String {
    value.chars().take(MAX_HEADER_LEN).collect()
}

/// True when `ip` equals a listed address or falls inside a listed CIDR block
pub fn is_trusted_proxy(ip: IpAddr, trusted: &[String]) -> bool {
    trusted.iter().any(|entry| {
        if entry.contains('/') {
            ip_in_cidr(ip, entry)
        } else {
            entry.parse::<IpAddr>().is_ok_and(|proxy| proxy == ip)
        }
    })
}

pub fn ip_in_cidr(ip: IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(network), Ok(prefix_len)) = (network.parse::<IpAddr>(), prefix_len.parse::<u32>())
    else {
        return false;
    };

    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix_len <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0);
            u32::from(ip) & mask == u32::from(net) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix_len <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix_len).unwrap_or(0);
            u128::from(ip) & mask == u128::from(net) & mask
        }
        _ => false,
    }
}

/// Right-most `X-Forwarded-For` hop that is not itself a trusted proxy
///
/// Proxies append to the header, so everything left of the last untrusted
/// hop was written by the client and is ignored.
fn forwarded_client(headers: &HeaderMap, trusted: &[String]) -> Option<String> {
    let mut leftmost = None;
    let hops = headers
        .get_all("x-forwarded-for")
        .iter()
        .rev()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.rsplit(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    for hop in hops {
        if !hop.parse::<IpAddr>().is_ok_and(|ip| is_trusted_proxy(ip, trusted)) {
            return Some(bounded(hop));
        }
        leftmost = Some(hop);
    }
    leftmost.map(bounded)
}

/// Client address for logging and rate limiting
///
/// An untrusted peer is taken at its word. Behind a trusted proxy the
/// forwarded chain is consulted, then `X-Real-IP`, then the proxy itself.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[String]) -> Option<String> {
    let peer_ip = peer?.ip();
    if !is_trusted_proxy(peer_ip, trusted) {
        return Some(peer_ip.to_string());
    }

    let client = forwarded_client(headers, trusted)
        .or_else(|| header_str(headers, "x-real-ip").map(bounded))
        .unwrap_or_else(|| peer_ip.to_string());
    tracing::trace!(proxy = %peer_ip, client = %client, "Resolved client behind trusted proxy");
    Some(client)
}

/// ISO country code from CDN headers; `XX` (unknown) and `T1` (Tor) are dropped
pub fn country(headers: &HeaderMap) -> Option<String> {
    COUNTRY_HEADERS
        .iter()
        .find_map(|name| header_str(headers, name))
        .map(str::to_uppercase)
        .filter(|c| c != "XX" && c != "T1")
        .map(|c| bounded(&c))
}

pub fn city(headers: &HeaderMap) -> Option<String> {
    CITY_HEADERS
        .iter()
        .find_map(|name| header_str(headers, name))
        .map(bounded)
}

pub fn click_event(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted: &[String],
    now: DateTime<Utc>,
) -> ClickEvent {
    ClickEvent {
        ip: client_ip(headers, peer, trusted),
        user_agent: header_str(headers, header::USER_AGENT.as_str()).map(bounded),
        referer: header_str(headers, header::REFERER.as_str()).map(bounded),
        country: country(headers),
        city: city(headers),
        timestamp: now,
    }
}
