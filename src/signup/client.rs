//! Clients for the signup API. [`SignupBackend`] is the seam the state machine
//! talks through; [`HttpBackend`] is the reqwest implementation. Request bodies
//! carry codes and passwords and must never be logged; spans only record
//! endpoints and status codes.

use super::{
    error::{DispatchError, RegistrationError, VerificationError},
    types::{
        AuthSession, ErrorBody, RegisterRequest, RegisterResponse, SendOtpRequest,
        VerifyOtpRequest, SIGNUP_MODE,
    },
};
use crate::APP_USER_AGENT;
use reqwest::{Client, Response, StatusCode};
use std::{future::Future, time::Duration};
use tracing::{debug, instrument, warn};
use url::Url;

pub const SEND_OTP_PATH: &str = "/api/auth/send-otp";
pub const VERIFY_OTP_PATH: &str = "/api/auth/verify-otp";
pub const REGISTER_PATH: &str = "/api/auth/register";

/// Message the backend returns when the address already has an account.
pub const ALREADY_REGISTERED_MESSAGE: &str = "User already exists";

/// Default request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

/// External collaborators the signup flow depends on.
pub trait SignupBackend {
    /// Asks the backend to email a fresh code to `email`.
    fn send_otp(&self, email: &str) -> impl Future<Output = Result<(), DispatchError>> + Send;

    /// Confirms `code` for `email`.
    fn verify_otp(
        &self,
        email: &str,
        code: &str,
    ) -> impl Future<Output = Result<(), VerificationError>> + Send;

    /// Creates the account and returns the session for it.
    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<AuthSession, RegistrationError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend init).
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        build_url_with_base(&self.base_url, path)
    }
}

impl SignupBackend for HttpBackend {
    #[instrument(skip_all, fields(path = SEND_OTP_PATH))]
    async fn send_otp(&self, email: &str) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.url(SEND_OTP_PATH))
            .json(&SendOtpRequest {
                email,
                mode: SIGNUP_MODE,
            })
            .send()
            .await
            .map_err(|err| DispatchError::Transient(map_request_error(&err)))?;

        let status = response.status();
        debug!(%status, "send-otp response");
        if status.is_success() {
            return Ok(());
        }

        let message = error_message(response).await;
        if status == StatusCode::CONFLICT || message.as_deref() == Some(ALREADY_REGISTERED_MESSAGE)
        {
            return Err(DispatchError::AlreadyRegistered);
        }

        Err(DispatchError::Transient(
            message.unwrap_or_else(|| "Try again.".to_string()),
        ))
    }

    #[instrument(skip_all, fields(path = VERIFY_OTP_PATH))]
    async fn verify_otp(&self, email: &str, code: &str) -> Result<(), VerificationError> {
        let response = self
            .client
            .post(self.url(VERIFY_OTP_PATH))
            .json(&VerifyOtpRequest { email, otp: code })
            .send()
            .await
            .map_err(|err| VerificationError::Network(map_request_error(&err)))?;

        let status = response.status();
        debug!(%status, "verify-otp response");
        if status.is_success() {
            return Ok(());
        }

        if status.is_server_error() {
            let message = error_message(response).await;
            warn!(%status, "verify-otp failed upstream");
            return Err(VerificationError::Network(
                message.unwrap_or_else(|| "Failed to verify OTP.".to_string()),
            ));
        }

        Err(VerificationError::InvalidCode)
    }

    #[instrument(skip_all, fields(path = REGISTER_PATH))]
    async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, RegistrationError> {
        let response = self
            .client
            .post(self.url(REGISTER_PATH))
            .json(&request.payload())
            .send()
            .await
            .map_err(|err| RegistrationError::Network(map_request_error(&err)))?;

        let status = response.status();
        debug!(%status, "register response");
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(RegistrationError::Rejected(message.unwrap_or_else(|| {
                "Email may already be in use or OTP not verified.".to_string()
            })));
        }

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|err| RegistrationError::InvalidResponse(err.to_string()))?;

        Ok(AuthSession::new(body.token, body.user))
    }
}

/// Joins an explicit base URL and a path with exactly one slash between them.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Maps transport errors into user-facing text with timeout detection.
fn map_request_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timed out. Please try again.".to_string()
    } else {
        format!("Unable to reach the server: {err}")
    }
}

/// Pulls `message` out of a JSON error body, falling back to the raw text.
async fn error_message(response: Response) -> Option<String> {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or(body);

    sanitize_body(&message)
}

/// Trims and truncates error bodies before they reach the user.
fn sanitize_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_ERROR_CHARS).collect())
    }
}
