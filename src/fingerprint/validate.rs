//! Fingerprint drift classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DeviceFingerprint;

const RECOMMEND_REAUTH: &str = "Consider requiring re-authentication";
const RECOMMEND_IMMEDIATE_REAUTH: &str = "Require immediate re-authentication";
const RECOMMEND_MONITOR: &str = "Monitor for additional suspicious activity";

/// Qualitative risk of a fingerprint drift. Ordering is `Low < Medium < High`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Raise the level to `other` if it is higher; never lowers it.
    #[must_use]
    pub fn escalate(self, other: Self) -> Self {
        self.max(other)
    }

    /// Trust penalty applied by the scorer for an invalid match at this level.
    #[must_use]
    pub const fn penalty(self) -> f64 {
        match self {
            Self::Low => 0.1,
            Self::Medium => 0.3,
            Self::High => 0.5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single component that differs between two fingerprints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintChange {
    IpAddress,
    UserAgent,
    AcceptLanguage,
    AcceptEncoding,
}

impl FingerprintChange {
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::IpAddress => "IP address changed",
            Self::UserAgent => "User-Agent changed",
            Self::AcceptLanguage => "Accept-Language changed",
            Self::AcceptEncoding => "Accept-Encoding changed",
        }
    }
}

impl fmt::Display for FingerprintChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub risk: RiskLevel,
    pub changes: Vec<FingerprintChange>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_change(&self, change: FingerprintChange) -> bool {
        self.changes.contains(&change)
    }

    /// Human-readable change list for logs.
    #[must_use]
    pub fn describe_changes(&self) -> String {
        self.changes
            .iter()
            .map(|change| change.description())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compare `current` against the `stored` fingerprint.
///
/// Every rule is evaluated; risk only escalates. The result is valid when
/// nothing changed or when the IP address is the only change, so roaming
/// clients are tolerated even though the IP change alone is medium risk.
#[must_use]
pub fn validate(current: &DeviceFingerprint, stored: &DeviceFingerprint) -> ValidationResult {
    let mut result = ValidationResult::default();

    if current.ip != stored.ip {
        result.changes.push(FingerprintChange::IpAddress);
        result.risk = result.risk.escalate(RiskLevel::Medium);
        result.recommendations.push(RECOMMEND_REAUTH.to_string());
    }

    if current.user_agent != stored.user_agent {
        result.changes.push(FingerprintChange::UserAgent);
        result.risk = result.risk.escalate(RiskLevel::High);
        result
            .recommendations
            .push(RECOMMEND_IMMEDIATE_REAUTH.to_string());
    }

    if current.accept_language != stored.accept_language {
        result.changes.push(FingerprintChange::AcceptLanguage);
        result.risk = result.risk.escalate(RiskLevel::Medium);
        result.recommendations.push(RECOMMEND_MONITOR.to_string());
    }

    if current.accept_encoding != stored.accept_encoding {
        result.changes.push(FingerprintChange::AcceptEncoding);
        result.risk = result.risk.escalate(RiskLevel::Medium);
    }

    result.is_valid = matches!(
        result.changes.as_slice(),
        [] | [FingerprintChange::IpAddress]
    );

    result
}
