//! Request and response types for the signup API, plus the session produced
//! by a successful signup. Payloads carry passwords, codes and bearer tokens,
//! so they must never be logged.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Mode sent with dispatch requests so the backend rejects known addresses.
pub const SIGNUP_MODE: &str = "signup";

#[derive(Debug, Serialize)]
pub(crate) struct SendOtpRequest<'a> {
    pub email: &'a str,
    pub mode: &'a str,
}

#[derive(Serialize)]
pub(crate) struct VerifyOtpRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RegisterPayload<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub otp: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct RegisterResponse {
    pub token: String,
    pub user: UserIdentity,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

/// Everything the registration endpoint needs. The code is re-submitted so the
/// server makes the final call on verification.
#[derive(Clone, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub otp: SecretString,
}

impl RegisterRequest {
    pub(crate) fn payload(&self) -> RegisterPayload<'_> {
        RegisterPayload {
            name: &self.name,
            email: &self.email,
            password: self.password.expose_secret(),
            otp: self.otp.expose_secret(),
        }
    }
}

/// Minimal identity of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(alias = "_id", alias = "sub")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Credential plus identity. Outlives the signup flow.
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub token: SecretString,
    pub user: UserIdentity,
}

impl AuthSession {
    #[must_use]
    pub fn new(token: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            token: SecretString::from(token.into()),
            user,
        }
    }
}
