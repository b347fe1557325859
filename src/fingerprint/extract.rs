//! Fingerprint extraction from request headers and connection info.

use axum::http::HeaderMap;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use tracing::debug;

use super::DeviceFingerprint;

/// Client IP used when neither proxy headers nor the socket reveal one.
pub const UNKNOWN_IP: &str = "unknown";

/// Proxy headers consulted for the client IP, in precedence order.
const IP_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "x-connecting-ip"];

/// Minimal view of an HTTP request needed to fingerprint it.
pub trait RequestMetadata {
    fn header(&self, name: &str) -> Option<&str>;
    fn remote_address(&self) -> Option<String>;
}

/// [`RequestMetadata`] over axum headers and the optional peer address.
#[derive(Clone, Copy, Debug)]
pub struct RequestInfo<'a> {
    headers: &'a HeaderMap,
    peer: Option<SocketAddr>,
}

impl<'a> RequestInfo<'a> {
    #[must_use]
    pub fn new(headers: &'a HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self { headers, peer }
    }
}

impl RequestMetadata for RequestInfo<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    fn remote_address(&self) -> Option<String> {
        self.peer.map(|addr| addr.ip().to_string())
    }
}

// Field order is the canonical hash input; do not reorder.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Components<'a> {
    ip: &'a str,
    user_agent: &'a str,
    accept_language: Option<&'a str>,
    accept_encoding: Option<&'a str>,
}

/// Build a fingerprint for the current request. Never fails: missing headers
/// become an empty User-Agent or `None`.
pub fn extract(request: &impl RequestMetadata) -> DeviceFingerprint {
    let ip = client_ip(request);
    let user_agent = request.header("user-agent").unwrap_or_default();
    let accept_language = request.header("accept-language");
    let accept_encoding = request.header("accept-encoding");

    let hash = fingerprint_hash(&Components {
        ip: &ip,
        user_agent,
        accept_language,
        accept_encoding,
    });

    debug!(fingerprint = %hash, ip = %ip, "Generated device fingerprint");

    DeviceFingerprint {
        hash,
        ip,
        user_agent: user_agent.to_string(),
        accept_language: accept_language.map(str::to_string),
        accept_encoding: accept_encoding.map(str::to_string),
        timestamp: Utc::now(),
    }
}

fn client_ip(request: &impl RequestMetadata) -> String {
    IP_HEADERS
        .iter()
        .find_map(|name| {
            request
                .header(name)
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
        .or_else(|| request.remote_address())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

fn fingerprint_hash(components: &Components<'_>) -> String {
    // Serializing borrowed strings cannot fail.
    let canonical = serde_json::to_vec(components).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}
