//! API handlers for guardian.
//!
//! `session` owns the fingerprint risk middleware and the endpoints behind it;
//! `health` and `root` are public and never create sessions.

pub mod health;
pub mod root;
pub mod session;
