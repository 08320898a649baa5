//! Federated (Google) sign-in. The visitor is sent to the backend's
//! authorization endpoint; the backend redirects back with a token in the URL,
//! which is decoded locally into a session.
//!
//! The token signature is NOT verified here. Trust rests entirely on the
//! token arriving from the redirect target over the transport. Treat this as a
//! trust boundary: anything that needs a verified identity must ask the server.

use super::{
    auth::AuthContext,
    types::{AuthSession, UserIdentity},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const GOOGLE_AUTH_PATH: &str = "/api/auth/google";
/// Parameter carrying the token on the way back.
pub const TOKEN_PARAM: &str = "token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("no token in redirect")]
    Missing,
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid claims: {0}")]
    Claims(String),
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(alias = "_id", alias = "sub", alias = "userId")]
    id: String,
    #[serde(default)]
    name: String,
    email: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct FederatedRedirect {
    authorization_url: Url,
}

impl FederatedRedirect {
    /// # Errors
    ///
    /// Returns an error if `server_url` cannot be joined with the auth path.
    pub fn new(server_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            authorization_url: server_url.join(GOOGLE_AUTH_PATH)?,
        })
    }

    /// Where the visitor is sent to start the federated sign-in.
    #[must_use]
    pub fn authorization_url(&self) -> &Url {
        &self.authorization_url
    }

    /// Completes the redirect: decodes the returned token and logs in. A missing
    /// or malformed token is a silent no-op and returns `false`.
    pub fn resume(&self, returned: &Url, auth: &AuthContext) -> bool {
        match session_from_url(returned, now_unix_seconds()) {
            Ok(session) => {
                info!(user_id = %session.user.id, "federated sign-in resumed");
                auth.login(session);
                true
            }
            Err(err) => {
                debug!(%err, "ignoring federated redirect");
                false
            }
        }
    }
}

/// Reads the token from the query string, falling back to the fragment.
#[must_use]
pub fn extract_token(url: &Url) -> Option<String> {
    let from_query = url
        .query_pairs()
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| value.into_owned());

    from_query
        .or_else(|| {
            let fragment = url.fragment()?;
            url::form_urlencoded::parse(fragment.as_bytes())
                .find(|(key, _)| key == TOKEN_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|token| !token.trim().is_empty())
}

/// Decodes the payload segment of a JWT into a session, without verifying the
/// signature.
///
/// # Errors
///
/// Returns an error if the token is not three dot-separated segments, the
/// payload is not base64url JSON with the expected claims, or `exp` is past.
pub fn decode_session(token: &str, now_unix_seconds: i64) -> Result<AuthSession, TokenError> {
    let token = token.trim();
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::TokenFormat);
    };

    let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('='))
        .map_err(|_| TokenError::Base64)?;
    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|err| TokenError::Claims(err.to_string()))?;

    if claims.exp.is_some_and(|exp| exp <= now_unix_seconds) {
        return Err(TokenError::Expired);
    }

    Ok(AuthSession::new(
        token,
        UserIdentity {
            id: claims.id,
            name: claims.name,
            email: claims.email,
            role: claims.role,
        },
    ))
}

fn session_from_url(url: &Url, now_unix_seconds: i64) -> Result<AuthSession, TokenError> {
    let token = extract_token(url).ok_or(TokenError::Missing)?;
    decode_session(&token, now_unix_seconds)
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
