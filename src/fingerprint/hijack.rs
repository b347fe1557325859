//! Session hijacking heuristic, used for alerting only.

use std::net::Ipv4Addr;

use super::DeviceFingerprint;

/// True when both the User-Agent and the client network changed.
#[must_use]
pub fn detect_hijacking(current: &DeviceFingerprint, stored: &DeviceFingerprint) -> bool {
    current.user_agent != stored.user_agent && significant_ip_change(&current.ip, &stored.ip)
}

/// IPv4 addresses count as significantly changed when their /24 differs; any
/// other change (IPv6, `unknown`, mixed families) is always significant.
#[must_use]
pub fn significant_ip_change(current: &str, stored: &str) -> bool {
    match (current.parse::<Ipv4Addr>(), stored.parse::<Ipv4Addr>()) {
        (Ok(current), Ok(stored)) => current.octets()[..3] != stored.octets()[..3],
        _ => current != stored,
    }
}
