//! # EduFlow signup client
//!
//! `eduflow-signup` drives account creation for EduFlow. Registration is gated
//! behind proof of inbox ownership: the visitor enters an address on the
//! trusted mail domain, receives a one-time passcode, confirms it, and only then
//! completes the profile that creates the account.
//!
//! ## Flow
//!
//! 1. **Email:** the address must belong to the configured domain before any
//!    request leaves the client.
//! 2. **Dispatch:** `POST /api/auth/send-otp` issues a code. Resends are gated
//!    by a client-side cooldown.
//! 3. **Verify:** `POST /api/auth/verify-otp` confirms the code.
//! 4. **Register:** `POST /api/auth/register` re-submits the code with the
//!    profile so the server performs the final check.
//!
//! A federated (Google) sign-in can bypass all four steps: the provider
//! redirects back with a token that is decoded locally into a session.
//!
//! The resulting session lives in a process-wide [`signup::auth::AuthContext`].

pub mod cli;
pub mod signup;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
