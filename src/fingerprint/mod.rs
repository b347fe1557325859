//! Device fingerprinting and session risk classification.
//!
//! Flow Overview:
//! 1) `extract` hashes request metadata (IP, User-Agent, Accept-Language,
//!    Accept-Encoding) into a [`DeviceFingerprint`].
//! 2) `validate` compares a fresh fingerprint with the one stored in the session
//!    and classifies the drift into a [`RiskLevel`].
//! 3) `trust` folds a principal's fingerprint history into a score in `[0, 1]`.
//! 4) `hijack` raises a binary alert when both the User-Agent and the client
//!    network change between requests.
//!
//! Everything in this module is pure and synchronous; storage and HTTP wiring
//! live in `session` and `api`.

mod extract;
mod hijack;
mod trust;
mod validate;

pub use extract::{RequestInfo, RequestMetadata, UNKNOWN_IP, extract};
pub use hijack::{detect_hijacking, significant_ip_change};
pub use trust::{NEUTRAL_TRUST, trust_score};
pub use validate::{FingerprintChange, RiskLevel, ValidationResult, validate};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hash-identified bundle of request metadata, used as a weak device identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFingerprint {
    pub hash: String,
    pub ip: String,
    pub user_agent: String,
    pub accept_language: Option<String>,
    pub accept_encoding: Option<String>,
    pub timestamp: DateTime<Utc>,
}
