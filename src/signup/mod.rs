//! Signup feature: email policy, cooldown, API clients, the OTP-gated state
//! machine and the federated shortcut. Passwords, codes and tokens pass
//! through here and must never be logged.
//!
//! Flow Overview: `set_email` → `request_otp` (starts the cooldown) →
//! `verify_otp` → profile setters → `submit_profile`, which logs the new
//! session into the shared [`AuthContext`].

pub mod auth;
pub mod client;
pub mod cooldown;
pub mod email;
pub mod error;
pub mod federated;
pub mod flow;
pub mod notice;
pub mod types;

pub use auth::{AuthContext, AuthState};
pub use client::{HttpBackend, SignupBackend};
pub use cooldown::CooldownTimer;
pub use email::EmailPolicy;
pub use error::{DispatchError, FlowError, RegistrationError, ValidationError, VerificationError};
pub use federated::FederatedRedirect;
pub use flow::{FlowAction, FlowConfig, FlowPhase, SignupFlow, SignupOutcome};
pub use notice::{Notice, NoticeLevel};
pub use types::{AuthSession, RegisterRequest, UserIdentity};
