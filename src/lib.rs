//! # Guardian (Fingerprint-Guarded Sessions)
//!
//! `guardian` binds web sessions to the device that opened them. Every request
//! on a guarded route is reduced to a [`fingerprint::DeviceFingerprint`] built
//! from the client IP and a handful of request headers, then compared with the
//! fingerprint stored in the session.
//!
//! ## Risk Handling
//!
//! - **User-Agent change:** high risk. The session is destroyed and the request
//!   fails with `401 Unauthorized`.
//! - **Language or encoding change:** medium risk. The stored fingerprint is
//!   replaced and the session trust score decays.
//! - **IP-only change:** tolerated as roaming; the session is left untouched.
//!
//! ## Device History
//!
//! Once a session is bound to a user, fingerprints are appended to a bounded
//! per-user history. A trust score in `[0, 1]` is derived from how well the
//! current device matches that history.
//!
//! The HTTP surface never learns who the user is: authentication belongs to
//! the embedding application. After a successful login it calls
//! [`SessionGuard::bind_user`](api::handlers::session::SessionGuard::bind_user)
//! with the session's store key (see
//! [`ActiveSession`](api::handlers::session::ActiveSession), available as a
//! request extension on guarded routes). Binding sets the session's trust
//! score from the user's history and records the device. From then on,
//! medium-risk drift on that session is also appended to the history, and
//! `GET /v1/session` reports `historyTrust`. A standalone `guardian` binary
//! has no login flow, so its sessions stay unbound.
//!
//! Sessions and histories live in Redis when `--redis-url` is given, otherwise
//! in process memory.

pub mod api;
pub mod cli;
pub mod fingerprint;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
