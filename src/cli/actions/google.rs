//! Federated sign-in through the browser.

use crate::cli::{callback::CallbackListener, prompt};
use crate::signup::{AuthContext, FederatedRedirect, Notice};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub server_url: Url,
    pub frontend_url: Url,
    pub callback_port: u16,
    pub callback_timeout: Duration,
    pub open_browser: bool,
}

/// Sends the visitor to the Google route and waits for the redirect back. A
/// redirect without a usable token, or none at all, only prints a notice.
///
/// # Errors
///
/// Returns an error if the server URL is unusable or the callback port cannot
/// be bound.
pub async fn execute(args: Args) -> Result<()> {
    let redirect = FederatedRedirect::new(&args.server_url)
        .context("invalid --server-url for Google sign-in")?;
    let listener = CallbackListener::bind(args.callback_port).await?;

    prompt::header("Sign in with Google");
    prompt::info(&format!(
        "Open {} and finish signing in. Redirects to {} are captured.",
        redirect.authorization_url(),
        listener.origin()
    ));

    if args.open_browser {
        if let Err(err) = open::that(redirect.authorization_url().as_str()) {
            warn!(%err, "could not open a browser");
        }
    }

    let returned = listener.wait(args.callback_timeout).await?;
    if returned.is_none() {
        info!(
            timeout = args.callback_timeout.as_secs(),
            "no sign-in redirect received"
        );
    }

    let auth = AuthContext::new();
    let notice = complete(&redirect, returned.as_ref(), &auth);
    prompt::notice(&notice);
    if auth.is_authenticated() {
        prompt::info(&format!("Continue at {}", args.frontend_url));
    }

    Ok(())
}

/// Resumes the redirect into `auth` and picks the notice to show.
fn complete(redirect: &FederatedRedirect, returned: Option<&Url>, auth: &AuthContext) -> Notice {
    if let Some(url) = returned {
        debug!(path = url.path(), "redirect received");
        if redirect.resume(url, auth) {
            if let Some(session) = auth.session() {
                return Notice::signed_in(&session.user);
            }
        }
    }
    Notice::sign_in_incomplete()
}
