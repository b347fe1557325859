//! Trust scoring over a principal's fingerprint history.

use super::{DeviceFingerprint, validate};

/// Score for a principal with no history (new device).
pub const NEUTRAL_TRUST: f64 = 0.5;

/// Fold `history` into a trust score in `[0, 1]` for `current`.
///
/// Each invalid match subtracts its risk penalty; the remainder is then scaled
/// by the share of history entries that matched.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trust_score(current: &DeviceFingerprint, history: &[DeviceFingerprint]) -> f64 {
    if history.is_empty() {
        return NEUTRAL_TRUST;
    }

    let mut score = 1.0;
    let mut consistent_sessions = 0_usize;

    for previous in history {
        let result = validate(current, previous);
        if result.is_valid {
            consistent_sessions += 1;
        } else {
            score -= result.risk.penalty();
        }
    }

    let consistency = consistent_sessions as f64 / history.len() as f64;
    (score * consistency).clamp(0.0, 1.0)
}
