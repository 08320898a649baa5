//! User-facing notifications for each flow outcome. Messages never include
//! server internals beyond the sanitized message the client already received.

use super::{
    error::{DispatchError, FlowError, RegistrationError, ValidationError, VerificationError},
    types::UserIdentity,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    /// Set when the visitor should go to the login page instead.
    pub suggest_login: bool,
}

impl Notice {
    fn success(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.to_string(),
            description: description.into(),
            suggest_login: false,
        }
    }

    fn error(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            description: description.into(),
            suggest_login: false,
        }
    }

    #[must_use]
    pub fn otp_sent() -> Self {
        Self::success("OTP Sent", "Check your email for the OTP.")
    }

    #[must_use]
    pub fn otp_verified() -> Self {
        Self::success("OTP Verified", "You can now create your account.")
    }

    #[must_use]
    pub fn account_created() -> Self {
        Self::success("Account Created", "Welcome to EduFlow!")
    }

    #[must_use]
    pub fn signed_in(user: &UserIdentity) -> Self {
        let who = if user.name.trim().is_empty() {
            &user.email
        } else {
            &user.name
        };
        Self::success("Signed In", format!("Welcome, {who}!"))
    }

    /// The federated redirect came back without a usable token.
    #[must_use]
    pub fn sign_in_incomplete() -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "Sign-in Not Completed".to_string(),
            description: "No Google sign-in was received. You can still sign up with an email code."
                .to_string(),
            suggest_login: false,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl From<&FlowError> for Notice {
    fn from(err: &FlowError) -> Self {
        match err {
            FlowError::Validation(err) => validation_notice(err),
            FlowError::Dispatch(DispatchError::AlreadyRegistered) => Self {
                suggest_login: true,
                ..Self::error(
                    "User Already Exists",
                    "This email is already registered. Please login instead.",
                )
            },
            FlowError::Dispatch(DispatchError::Transient(message)) => {
                Self::error("Failed to send OTP", message.clone())
            }
            FlowError::Verification(VerificationError::InvalidCode) => {
                Self::error("Invalid OTP", "Please check your OTP and try again.")
            }
            FlowError::Verification(VerificationError::Network(_)) => {
                Self::error("Error", "Failed to verify OTP.")
            }
            FlowError::Registration(RegistrationError::Rejected(message)) => {
                Self::error("Signup Failed", message.clone())
            }
            FlowError::Registration(_) => Self::error("Error", "Unexpected error. Try again."),
            FlowError::CooldownActive { remaining } => Self::error(
                "Please Wait",
                format!("You can request a new code in {remaining}s."),
            ),
            FlowError::Busy(action) => {
                Self::error("Please Wait", format!("Still trying to {action}."))
            }
            FlowError::InvalidTransition { .. } => Self::error("Not Available", err.to_string()),
            FlowError::Stale => Self::error(
                "Request Superseded",
                "That response belonged to an earlier request.",
            ),
        }
    }
}

fn validation_notice(err: &ValidationError) -> Notice {
    match err {
        ValidationError::EmailDomain { domain } => Notice::error(
            "Invalid Email",
            format!("Please use a {domain} address to sign up."),
        ),
        ValidationError::MissingName => {
            Notice::error("Missing Name", "Please enter your full name.")
        }
        ValidationError::MissingPassword => {
            Notice::error("Missing Password", "Please choose a password.")
        }
        ValidationError::PasswordMismatch => {
            Notice::error("Password Mismatch", "Passwords do not match.")
        }
        ValidationError::CodeLength { expected } => Notice::error(
            "Invalid OTP",
            format!("Enter the {expected}-digit code we sent to your email."),
        ),
        ValidationError::NotVerified => Notice::error(
            "OTP Not Verified",
            "Please verify your OTP before creating an account.",
        ),
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}
