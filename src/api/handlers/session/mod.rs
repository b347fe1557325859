//! Session handlers and the fingerprint risk middleware.
//!
//! Every route under `/v1/session` runs behind [`session_risk`]:
//!
//! - **First request:** a session is issued (cookie `guardian_session`) and the
//!   request fingerprint is stored with a neutral trust score of `0.5`.
//! - **Roaming:** an IP-only change is tolerated without touching the session.
//! - **Medium risk:** the fingerprint is replaced and trust decays by the
//!   configured factor (`0.8` by default).
//! - **High risk:** a User-Agent change destroys the session and the request
//!   fails with `401` and code `FINGERPRINT_VALIDATION_FAILED`.

pub(crate) mod endpoints;
mod middleware;
mod state;
pub(crate) mod types;

pub use middleware::{FINGERPRINT_REJECTION_CODE, SESSION_COOKIE_NAME, session_risk};
pub use state::{ActiveSession, GuardConfig, SessionGuard};

#[cfg(test)]
mod tests;
