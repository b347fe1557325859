//! Per-request session risk state machine.
//!
//! Flow Overview:
//! 1) No stored fingerprint: store the current one and reset trust to neutral.
//! 2) Stored fingerprint matches (or only the IP roamed): leave the session alone.
//! 3) High risk: reject; the caller destroys the session.
//! 4) Medium risk: replace the fingerprint and decay the trust score.
//!
//! The hijacking heuristic runs alongside and only raises an alert.

use tracing::{info, warn};

use super::Session;
use crate::fingerprint::{
    DeviceFingerprint, NEUTRAL_TRUST, RiskLevel, ValidationResult, detect_hijacking, validate,
};

/// Trust multiplier applied on medium-risk drift.
pub const DEFAULT_TRUST_DECAY: f64 = 0.8;

#[derive(Clone, Debug, PartialEq)]
pub enum RiskOutcome {
    /// First fingerprint stored on this session.
    Initialized,
    /// Fingerprint accepted without touching the session.
    Accepted(ValidationResult),
    /// Fingerprint replaced and trust decayed.
    Drifted(ValidationResult),
    /// Session must be destroyed and the request refused.
    Rejected(ValidationResult),
}

impl RiskOutcome {
    /// Whether the session changed and must be written back.
    #[must_use]
    pub fn is_mutated(&self) -> bool {
        matches!(self, Self::Initialized | Self::Drifted(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assessment {
    pub outcome: RiskOutcome,
    pub hijack_suspected: bool,
}

/// Evaluate `current` against `session` and apply the resulting mutation.
pub fn assess(session: &mut Session, current: DeviceFingerprint, trust_decay: f64) -> Assessment {
    let Some(stored) = session.fingerprint.as_ref() else {
        info!(fingerprint = %current.hash, "Storing initial session fingerprint");
        session.fingerprint = Some(current);
        session.trust_score = NEUTRAL_TRUST;
        return Assessment {
            outcome: RiskOutcome::Initialized,
            hijack_suspected: false,
        };
    };

    let hijack_suspected = detect_hijacking(&current, stored);
    if hijack_suspected {
        warn!(
            user_id = session.user_id.as_deref().unwrap_or("anonymous"),
            stored_ip = %stored.ip,
            current_ip = %current.ip,
            "Possible session hijacking: User-Agent and network changed"
        );
    }

    let result = validate(&current, stored);

    let outcome = if result.is_valid {
        if !result.changes.is_empty() {
            info!(changes = %result.describe_changes(), "Tolerated fingerprint drift");
        }
        RiskOutcome::Accepted(result)
    } else {
        match result.risk {
            RiskLevel::High => {
                warn!(
                    changes = %result.describe_changes(),
                    "High-risk fingerprint change, rejecting session"
                );
                RiskOutcome::Rejected(result)
            }
            RiskLevel::Medium => {
                warn!(
                    changes = %result.describe_changes(),
                    trust_score = session.trust_score * trust_decay,
                    "Medium-risk fingerprint change, decaying trust"
                );
                session.fingerprint = Some(current);
                session.trust_score *= trust_decay;
                RiskOutcome::Drifted(result)
            }
            // Invalid results always carry at least one medium-risk change.
            RiskLevel::Low => RiskOutcome::Accepted(result),
        }
    };

    Assessment {
        outcome,
        hijack_suspected,
    }
}
