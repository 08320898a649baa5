use super::flow::{FlowAction, FlowPhase};
use thiserror::Error;

/// Local input problems. These never reach the network.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email must be an address on {domain}")]
    EmailDomain { domain: String },
    #[error("name is required")]
    MissingName,
    #[error("password is required")]
    MissingPassword,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("verification code must be {expected} characters")]
    CodeLength { expected: usize },
    #[error("verification code has not been confirmed")]
    NotVerified,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Terminal for the flow; the visitor should log in instead.
    #[error("email is already registered")]
    AlreadyRegistered,
    #[error("failed to send verification code: {0}")]
    Transient(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("invalid verification code")]
    InvalidCode,
    #[error("failed to verify code: {0}")]
    Network(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("registration rejected: {0}")]
    Rejected(String),
    #[error("registration failed: {0}")]
    Network(String),
    #[error("invalid registration response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("please wait {remaining}s before requesting another code")]
    CooldownActive { remaining: u32 },
    #[error("cannot {action} while in {phase}")]
    InvalidTransition { phase: FlowPhase, action: FlowAction },
    #[error("{0} is already in progress")]
    Busy(FlowAction),
    #[error("response belongs to a superseded request")]
    Stale,
}

impl FlowError {
    /// Whether the visitor can fix this by resubmitting.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Dispatch(DispatchError::AlreadyRegistered) | Self::InvalidTransition { .. }
        )
    }
}
