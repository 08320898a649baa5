//! Interactive signup: email, code, then profile.

use crate::cli::prompt;
use crate::signup::{
    AuthContext, FlowConfig, FlowError, FlowPhase, HttpBackend, Notice,
    SignupBackend, SignupFlow,
};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

const RESEND: &str = "resend";
const CHANGE_EMAIL: &str = "change";

#[derive(Debug)]
pub struct Args {
    pub server_url: Url,
    pub frontend_url: Url,
    pub request_timeout: Duration,
    pub flow: FlowConfig,
}

/// Runs the signup until the account exists or the email turns out to be
/// registered already.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the terminal fails.
pub async fn execute(args: Args) -> Result<()> {
    let backend = HttpBackend::new(&args.server_url, args.request_timeout)
        .context("failed to build HTTP client")?;
    let mut flow = SignupFlow::new(backend, AuthContext::new(), args.flow);

    prompt::header(&format!(
        "Create your EduFlow account (only @{} addresses)",
        flow.config().policy.domain()
    ));

    loop {
        let step = match prompt_for(flow.phase()) {
            Stage::Email => email_step(&mut flow, &args.frontend_url).await?,
            Stage::Code => code_step(&mut flow, &args.frontend_url).await?,
            Stage::Profile => profile_step(&mut flow, &args.frontend_url).await?,
            Stage::Done => Step::Stop,
        };

        if let Step::Stop = step {
            return Ok(());
        }
    }
}

/// What the terminal asks for next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Email,
    Code,
    Profile,
    Done,
}

enum Step {
    Continue,
    Stop,
}

/// `OtpVerified` is transient and already allows profile entry.
const fn prompt_for(phase: FlowPhase) -> Stage {
    match phase {
        FlowPhase::EmailEntry => Stage::Email,
        FlowPhase::OtpPending => Stage::Code,
        FlowPhase::OtpVerified | FlowPhase::ProfileEntry => Stage::Profile,
        FlowPhase::Submitted => Stage::Done,
    }
}

async fn email_step<B: SignupBackend>(
    flow: &mut SignupFlow<B>,
    frontend_url: &Url,
) -> Result<Step> {
    let email = prompt::input("Email", false).await?;
    if let Err(err) = flow.set_email(&email) {
        prompt::notice(&Notice::from(&err));
        return Ok(Step::Continue);
    }

    match prompt::with_status("Sending code", flow.request_otp()).await {
        Ok(()) => {
            prompt::notice(&Notice::otp_sent());
            Ok(Step::Continue)
        }
        Err(err) => Ok(report(&err, frontend_url)),
    }
}

async fn code_step<B: SignupBackend>(
    flow: &mut SignupFlow<B>,
    frontend_url: &Url,
) -> Result<Step> {
    let remaining = flow.cooldown_remaining();
    let hint = if remaining > 0 {
        format!("resend in {remaining}s")
    } else {
        format!("or '{RESEND}'")
    };
    let answer = prompt::input(
        format!(
            "Verification code sent to {} ({hint}, '{CHANGE_EMAIL}' to edit email)",
            flow.draft().email
        ),
        false,
    )
    .await?;
    let answer = answer.trim();

    if answer.eq_ignore_ascii_case(CHANGE_EMAIL) {
        flow.set_email("")?;
        return Ok(Step::Continue);
    }

    if answer.eq_ignore_ascii_case(RESEND) {
        return match prompt::with_status("Sending code", flow.request_otp()).await {
            Ok(()) => {
                prompt::notice(&Notice::otp_sent());
                Ok(Step::Continue)
            }
            Err(err) => Ok(report(&err, frontend_url)),
        };
    }

    match prompt::with_status("Verifying", flow.verify_otp(answer)).await {
        Ok(()) => {
            prompt::notice(&Notice::otp_verified());
            Ok(Step::Continue)
        }
        Err(err) => Ok(report(&err, frontend_url)),
    }
}

async fn profile_step<B: SignupBackend>(
    flow: &mut SignupFlow<B>,
    frontend_url: &Url,
) -> Result<Step> {
    let name = prompt::input("Full name", true).await?;
    flow.set_name(&name)?;
    flow.set_password(prompt::password("Password").await?)?;
    flow.set_confirm_password(prompt::password("Confirm password").await?)?;

    match prompt::with_status("Creating account", flow.submit_profile()).await {
        Ok(outcome) => {
            prompt::notice(&Notice::account_created());
            let destination = frontend_url
                .join(&outcome.destination)
                .map_or_else(|_| outcome.destination.clone(), String::from);
            prompt::info(&format!("Continue at {destination}"));
            debug!(user_id = %outcome.user.id, "signup finished");
            Ok(Step::Continue)
        }
        Err(err) => Ok(report(&err, frontend_url)),
    }
}

/// Prints the failure. An already registered email ends the session with a
/// pointer to the login page.
fn report(err: &FlowError, frontend_url: &Url) -> Step {
    let notice = Notice::from(err);
    prompt::notice(&notice);

    if notice.suggest_login {
        if let Ok(login) = frontend_url.join("/login") {
            prompt::info(&format!("Log in at {login}"));
        }
        return Step::Stop;
    }

    Step::Continue
}
