//! OTP-gated signup state machine.
//!
//! Phases move `EmailEntry → OtpPending → OtpVerified → ProfileEntry →
//! Submitted`, with a back-edge from `OtpPending` to `EmailEntry` when the
//! email changes. Only explicit actions move the phase; the cooldown ticker
//! only toggles dispatch eligibility.
//!
//! Every network action has two halves. `begin_*` checks the guards, marks the
//! action pending and hands out a [`Ticket`]. `complete_*` applies the
//! collaborator's result, but only if the ticket still belongs to this flow and
//! to the current epoch; editing the email or finishing the flow bumps the
//! epoch so late responses are dropped. The async helpers
//! ([`SignupFlow::request_otp`], [`SignupFlow::verify_otp`],
//! [`SignupFlow::submit_profile`]) run both halves against the backend.

use super::{
    auth::AuthContext,
    client::SignupBackend,
    cooldown::{CooldownReader, CooldownTimer, DEFAULT_COOLDOWN_SECONDS},
    email::{normalize_email, EmailPolicy},
    error::{
        DispatchError, FlowError, RegistrationError, ValidationError, VerificationError,
    },
    types::{AuthSession, RegisterRequest, UserIdentity},
};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, info, instrument};
use ulid::Ulid;

/// Expected number of characters in a passcode.
pub const DEFAULT_OTP_LENGTH: usize = 6;
/// Where the visitor lands after a successful signup.
pub const DEFAULT_POST_SIGNUP_PATH: &str = "/student";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowPhase {
    EmailEntry,
    OtpPending,
    OtpVerified,
    ProfileEntry,
    Submitted,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EmailEntry => "email entry",
            Self::OtpPending => "otp pending",
            Self::OtpVerified => "otp verified",
            Self::ProfileEntry => "profile entry",
            Self::Submitted => "submitted",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowAction {
    EditEmail,
    EditProfile,
    RequestOtp,
    VerifyOtp,
    SubmitProfile,
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EditEmail => "edit email",
            Self::EditProfile => "edit profile",
            Self::RequestOtp => "request a code",
            Self::VerifyOtp => "verify a code",
            Self::SubmitProfile => "submit profile",
        };
        f.write_str(name)
    }
}

/// Form input collected across the flow.
#[derive(Clone, Debug)]
pub struct SignupDraft {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

impl Default for SignupDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            password: SecretString::from(String::new()),
            confirm_password: SecretString::from(String::new()),
        }
    }
}

/// A dispatched code for one address.
#[derive(Clone, Debug)]
pub struct OtpSession {
    pub email: String,
    pub verified: bool,
    code: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct FlowConfig {
    pub policy: EmailPolicy,
    pub cooldown_seconds: u32,
    pub otp_length: usize,
    pub post_signup_path: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            policy: EmailPolicy::default(),
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            otp_length: DEFAULT_OTP_LENGTH,
            post_signup_path: DEFAULT_POST_SIGNUP_PATH.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DispatchRequest {
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct VerifyRequest {
    pub email: String,
    pub code: SecretString,
}

/// Proof that a network action was started by a specific flow at a specific
/// epoch. Not cloneable, so each result is applied at most once.
#[derive(Debug)]
pub struct Ticket<T> {
    flow_id: Ulid,
    epoch: u64,
    action: FlowAction,
    request: T,
}

impl<T> Ticket<T> {
    #[must_use]
    pub fn request(&self) -> &T {
        &self.request
    }

    #[must_use]
    pub fn action(&self) -> FlowAction {
        self.action
    }

    #[must_use]
    pub fn flow_id(&self) -> Ulid {
        self.flow_id
    }
}

/// Result of the terminal transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignupOutcome {
    pub user: UserIdentity,
    pub destination: String,
}

/// Clears the pending marker when the request future completes or is dropped.
struct PendingGuard<'a>(&'a mut Option<FlowAction>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.take();
    }
}

pub struct SignupFlow<B> {
    id: Ulid,
    epoch: u64,
    phase: FlowPhase,
    draft: SignupDraft,
    otp: Option<OtpSession>,
    cooldown: CooldownTimer,
    /// Address the running cooldown was started for.
    cooldown_email: Option<String>,
    pending: Option<FlowAction>,
    config: FlowConfig,
    backend: B,
    auth: AuthContext,
}

impl<B> fmt::Debug for SignupFlow<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupFlow")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .field("phase", &self.phase)
            .field("pending", &self.pending)
            .field("cooldown", &self.cooldown.remaining())
            .finish_non_exhaustive()
    }
}

impl<B: SignupBackend> SignupFlow<B> {
    /// Creates a flow with a self-ticking cooldown.
    #[must_use]
    pub fn new(backend: B, auth: AuthContext, config: FlowConfig) -> Self {
        Self::with_cooldown(backend, auth, config, CooldownTimer::default())
    }

    #[must_use]
    pub fn with_cooldown(
        backend: B,
        auth: AuthContext,
        config: FlowConfig,
        cooldown: CooldownTimer,
    ) -> Self {
        Self {
            id: Ulid::new(),
            epoch: 0,
            phase: FlowPhase::EmailEntry,
            draft: SignupDraft::default(),
            otp: None,
            cooldown,
            cooldown_email: None,
            pending: None,
            config,
            backend,
            auth,
        }
    }

    #[must_use]
    pub fn id(&self) -> Ulid {
        self.id
    }

    #[must_use]
    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    #[must_use]
    pub fn draft(&self) -> &SignupDraft {
        &self.draft
    }

    #[must_use]
    pub fn otp_session(&self) -> Option<&OtpSession> {
        self.otp.as_ref()
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.otp.as_ref().is_some_and(|otp| otp.verified)
    }

    /// Cooldown left before another code may go to the current email. A
    /// cooldown started for a different address does not count.
    #[must_use]
    pub fn cooldown_remaining(&self) -> u32 {
        match &self.cooldown_email {
            Some(email) if *email == self.draft.email => self.cooldown.remaining(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn cooldown_reader(&self) -> CooldownReader {
        self.cooldown.reader()
    }

    #[must_use]
    pub fn can_dispatch(&self) -> bool {
        self.cooldown_remaining() == 0
    }

    /// The action whose request is outstanding, if any.
    #[must_use]
    pub fn pending(&self) -> Option<FlowAction> {
        self.pending
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase == FlowPhase::Submitted
    }

    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Advances the cooldown by one unit. Never changes phase.
    pub fn tick(&self) -> u32 {
        self.cooldown.tick()
    }

    /// Edits the email. Changing it while a code is pending drops the code and
    /// returns to `EmailEntry`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` once the code has been verified.
    pub fn set_email(&mut self, email: &str) -> Result<(), FlowError> {
        match self.phase {
            FlowPhase::EmailEntry | FlowPhase::OtpPending => {}
            phase => {
                return Err(FlowError::InvalidTransition {
                    phase,
                    action: FlowAction::EditEmail,
                })
            }
        }

        let email = normalize_email(email);
        if email == self.draft.email {
            return Ok(());
        }
        self.draft.email = email;

        if self.phase == FlowPhase::OtpPending {
            info!(flow = %self.id, "email changed, pending code discarded");
            self.otp = None;
            self.phase = FlowPhase::EmailEntry;
        }
        self.supersede();

        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidTransition` after the flow has finished.
    pub fn set_name(&mut self, name: &str) -> Result<(), FlowError> {
        self.ensure_editable()?;
        self.draft.name = name.to_string();
        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidTransition` after the flow has finished.
    pub fn set_password(&mut self, password: SecretString) -> Result<(), FlowError> {
        self.ensure_editable()?;
        self.draft.password = password;
        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidTransition` after the flow has finished.
    pub fn set_confirm_password(&mut self, password: SecretString) -> Result<(), FlowError> {
        self.ensure_editable()?;
        self.draft.confirm_password = password;
        Ok(())
    }

    /// Checks dispatch guards and marks the request pending.
    ///
    /// # Errors
    ///
    /// Wrong phase, a request already in flight, an ineligible email, or an
    /// active cooldown.
    pub fn begin_dispatch(&mut self) -> Result<Ticket<DispatchRequest>, FlowError> {
        self.ensure_phase(
            &[FlowPhase::EmailEntry, FlowPhase::OtpPending],
            FlowAction::RequestOtp,
        )?;
        self.ensure_idle()?;

        if !self.config.policy.is_eligible(&self.draft.email) {
            return Err(self.domain_error().into());
        }

        let remaining = self.cooldown_remaining();
        if remaining > 0 {
            return Err(FlowError::CooldownActive { remaining });
        }

        Ok(self.issue(
            FlowAction::RequestOtp,
            DispatchRequest {
                email: self.draft.email.clone(),
            },
        ))
    }

    /// Applies a dispatch result.
    ///
    /// # Errors
    ///
    /// `Stale` for superseded tickets, otherwise the dispatch failure.
    pub fn complete_dispatch(
        &mut self,
        ticket: Ticket<DispatchRequest>,
        result: Result<(), DispatchError>,
    ) -> Result<(), FlowError> {
        self.accept(&ticket)?;
        result?;

        self.cooldown.start(self.config.cooldown_seconds);
        self.cooldown_email = Some(ticket.request.email.clone());
        self.otp = Some(OtpSession {
            email: ticket.request.email,
            verified: false,
            code: None,
        });
        self.phase = FlowPhase::OtpPending;
        info!(flow = %self.id, cooldown = self.config.cooldown_seconds, "verification code sent");

        Ok(())
    }

    /// Checks verification guards and marks the request pending.
    ///
    /// # Errors
    ///
    /// Wrong phase, a request already in flight, or a code of the wrong length.
    pub fn begin_verify(&mut self, code: &str) -> Result<Ticket<VerifyRequest>, FlowError> {
        self.ensure_phase(&[FlowPhase::OtpPending], FlowAction::VerifyOtp)?;
        self.ensure_idle()?;

        let code = code.trim();
        if code.chars().count() != self.config.otp_length {
            return Err(ValidationError::CodeLength {
                expected: self.config.otp_length,
            }
            .into());
        }

        let email = self
            .otp
            .as_ref()
            .map(|otp| otp.email.clone())
            .ok_or(FlowError::InvalidTransition {
                phase: self.phase,
                action: FlowAction::VerifyOtp,
            })?;

        Ok(self.issue(
            FlowAction::VerifyOtp,
            VerifyRequest {
                email,
                code: SecretString::from(code.to_string()),
            },
        ))
    }

    /// Applies a verification result. Success passes through `OtpVerified` and
    /// lands on `ProfileEntry`; failure keeps `OtpPending`.
    ///
    /// # Errors
    ///
    /// `Stale` for superseded tickets, otherwise the verification failure.
    pub fn complete_verify(
        &mut self,
        ticket: Ticket<VerifyRequest>,
        result: Result<(), VerificationError>,
    ) -> Result<(), FlowError> {
        self.accept(&ticket)?;
        result?;

        let Some(otp) = self.otp.as_mut() else {
            return Err(FlowError::Stale);
        };
        otp.verified = true;
        otp.code = Some(ticket.request.code);

        self.phase = FlowPhase::OtpVerified;
        debug!(flow = %self.id, "code verified");
        self.phase = FlowPhase::ProfileEntry;

        Ok(())
    }

    /// Checks every registration guard and marks the request pending. Nothing
    /// is sent unless all of them hold.
    ///
    /// # Errors
    ///
    /// Wrong phase, a request in flight, or any failed guard.
    pub fn begin_register(&mut self) -> Result<Ticket<RegisterRequest>, FlowError> {
        self.ensure_phase(&[FlowPhase::ProfileEntry], FlowAction::SubmitProfile)?;
        self.ensure_idle()?;

        if !self.config.policy.is_eligible(&self.draft.email) {
            return Err(self.domain_error().into());
        }
        if self.draft.name.trim().is_empty() {
            return Err(ValidationError::MissingName.into());
        }
        let password = self.draft.password.expose_secret();
        if password.trim().is_empty() {
            return Err(ValidationError::MissingPassword.into());
        }
        if password != self.draft.confirm_password.expose_secret() {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let code = self
            .otp
            .as_ref()
            .filter(|otp| otp.verified && otp.email == self.draft.email)
            .and_then(|otp| otp.code.clone())
            .ok_or(ValidationError::NotVerified)?;

        let request = RegisterRequest {
            name: self.draft.name.trim().to_string(),
            email: self.draft.email.clone(),
            password: self.draft.password.clone(),
            otp: code,
        };

        Ok(self.issue(FlowAction::SubmitProfile, request))
    }

    /// Applies a registration result. Success logs the session in and ends the
    /// flow; failure keeps every field for a retry.
    ///
    /// # Errors
    ///
    /// `Stale` for superseded tickets, otherwise the registration failure.
    pub fn complete_register(
        &mut self,
        ticket: Ticket<RegisterRequest>,
        result: Result<AuthSession, RegistrationError>,
    ) -> Result<SignupOutcome, FlowError> {
        self.accept(&ticket)?;
        let session = result?;

        let user = session.user.clone();
        self.auth.login(session);

        self.phase = FlowPhase::Submitted;
        self.draft = SignupDraft::default();
        self.otp = None;
        self.cooldown.cancel();
        self.cooldown_email = None;
        self.supersede();
        info!(flow = %self.id, "account created");

        Ok(SignupOutcome {
            user,
            destination: self.config.post_signup_path.clone(),
        })
    }

    /// Dispatches a code to the current email.
    ///
    /// # Errors
    ///
    /// Any guard or dispatch failure; state is unchanged on error.
    #[instrument(skip_all, fields(flow = %self.id))]
    pub async fn request_otp(&mut self) -> Result<(), FlowError> {
        let ticket = self.begin_dispatch()?;
        let result = {
            let _pending = PendingGuard(&mut self.pending);
            self.backend.send_otp(&ticket.request.email).await
        };
        self.complete_dispatch(ticket, result)
    }

    /// Verifies `code`. A no-op once the code has already been verified.
    ///
    /// # Errors
    ///
    /// Any guard or verification failure; the flow stays in `OtpPending`.
    #[instrument(skip_all, fields(flow = %self.id))]
    pub async fn verify_otp(&mut self, code: &str) -> Result<(), FlowError> {
        if self.phase == FlowPhase::ProfileEntry && self.is_verified() {
            debug!("code already verified");
            return Ok(());
        }

        let ticket = self.begin_verify(code)?;
        let result = {
            let _pending = PendingGuard(&mut self.pending);
            self.backend
                .verify_otp(&ticket.request.email, ticket.request.code.expose_secret())
                .await
        };
        self.complete_verify(ticket, result)
    }

    /// Creates the account from the current draft.
    ///
    /// # Errors
    ///
    /// Any guard or registration failure; entered fields are preserved.
    #[instrument(skip_all, fields(flow = %self.id))]
    pub async fn submit_profile(&mut self) -> Result<SignupOutcome, FlowError> {
        let ticket = self.begin_register()?;
        let result = {
            let _pending = PendingGuard(&mut self.pending);
            self.backend.register(&ticket.request).await
        };
        self.complete_register(ticket, result)
    }

    fn issue<T>(&mut self, action: FlowAction, request: T) -> Ticket<T> {
        self.pending = Some(action);
        Ticket {
            flow_id: self.id,
            epoch: self.epoch,
            action,
            request,
        }
    }

    fn accept<T>(&mut self, ticket: &Ticket<T>) -> Result<(), FlowError> {
        if ticket.flow_id != self.id || ticket.epoch != self.epoch {
            debug!(flow = %self.id, action = %ticket.action, "dropping stale response");
            return Err(FlowError::Stale);
        }
        self.pending = None;
        Ok(())
    }

    /// Invalidates every outstanding ticket.
    fn supersede(&mut self) {
        self.epoch += 1;
        self.pending = None;
    }

    fn ensure_phase(&self, allowed: &[FlowPhase], action: FlowAction) -> Result<(), FlowError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                phase: self.phase,
                action,
            })
        }
    }

    fn ensure_idle(&self) -> Result<(), FlowError> {
        match self.pending {
            Some(action) => Err(FlowError::Busy(action)),
            None => Ok(()),
        }
    }

    fn ensure_editable(&self) -> Result<(), FlowError> {
        if self.is_terminal() {
            return Err(FlowError::InvalidTransition {
                phase: self.phase,
                action: FlowAction::EditProfile,
            });
        }
        Ok(())
    }

    fn domain_error(&self) -> ValidationError {
        ValidationError::EmailDomain {
            domain: self.config.policy.domain().to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const CODE: &str = "123456";

    #[derive(Clone, Default)]
    struct FakeBackend {
        calls: Arc<Mutex<Vec<&'static str>>>,
        dispatch_error: Option<DispatchError>,
        register_error: Option<RegistrationError>,
        hang: bool,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl SignupBackend for FakeBackend {
        async fn send_otp(&self, _email: &str) -> Result<(), DispatchError> {
            self.record("send_otp");
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.dispatch_error.clone().map_or(Ok(()), Err)
        }

        async fn verify_otp(&self, _email: &str, code: &str) -> Result<(), VerificationError> {
            self.record("verify_otp");
            if code == CODE {
                Ok(())
            } else {
                Err(VerificationError::InvalidCode)
            }
        }

        async fn register(
            &self,
            request: &RegisterRequest,
        ) -> Result<AuthSession, RegistrationError> {
            self.record("register");
            if let Some(err) = self.register_error.clone() {
                return Err(err);
            }
            assert_eq!(request.otp.expose_secret(), CODE);
            Ok(AuthSession::new(
                "jwt",
                UserIdentity {
                    id: "u1".to_string(),
                    name: request.name.clone(),
                    email: request.email.clone(),
                    role: Some("student".to_string()),
                },
            ))
        }
    }

    fn flow_with(backend: FakeBackend) -> SignupFlow<FakeBackend> {
        SignupFlow::with_cooldown(
            backend,
            AuthContext::new(),
            FlowConfig::default(),
            CooldownTimer::manual(),
        )
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn drain_cooldown(flow: &SignupFlow<FakeBackend>) {
        while flow.tick() > 0 {}
    }

    async fn verified_flow() -> SignupFlow<FakeBackend> {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();
        flow.verify_otp(CODE).await.unwrap();
        flow
    }

    #[tokio::test]
    async fn signup_happy_path() {
        let mut flow = flow_with(FakeBackend::default());
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);

        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();
        assert_eq!(flow.phase(), FlowPhase::OtpPending);
        assert_eq!(flow.cooldown_remaining(), 60);

        let err = flow.verify_otp("000000").await.unwrap_err();
        assert_eq!(err, FlowError::Verification(VerificationError::InvalidCode));
        assert_eq!(flow.phase(), FlowPhase::OtpPending);

        flow.verify_otp(CODE).await.unwrap();
        assert_eq!(flow.phase(), FlowPhase::ProfileEntry);
        assert!(flow.is_verified());

        flow.set_name("Ada").unwrap();
        flow.set_password(secret("correct horse")).unwrap();
        flow.set_confirm_password(secret("battery staple")).unwrap();
        let err = flow.submit_profile().await.unwrap_err();
        assert_eq!(err, FlowError::Validation(ValidationError::PasswordMismatch));
        assert!(!flow.backend().calls().contains(&"register"));

        flow.set_confirm_password(secret("correct horse")).unwrap();
        let outcome = flow.submit_profile().await.unwrap();
        assert_eq!(outcome.destination, "/student");
        assert_eq!(outcome.user.email, "a@gmail.com");
        assert_eq!(flow.phase(), FlowPhase::Submitted);
        assert!(flow.is_terminal());
        assert!(flow.auth().is_authenticated());
        assert_eq!(flow.draft().password.expose_secret(), "");
        assert_eq!(
            flow.backend().calls(),
            vec!["send_otp", "verify_otp", "verify_otp", "register"]
        );
    }

    #[tokio::test]
    async fn ineligible_email_never_dispatches() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@yahoo.com").unwrap();

        let err = flow.request_otp().await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Validation(ValidationError::EmailDomain {
                domain: "gmail.com".to_string()
            })
        );
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);
        assert!(flow.otp_session().is_none());
        assert!(flow.backend().calls().is_empty());
        assert!(!flow.is_loading());
    }

    #[tokio::test]
    async fn resend_is_blocked_until_cooldown_elapses() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();

        assert_eq!(
            flow.request_otp().await.unwrap_err(),
            FlowError::CooldownActive { remaining: 60 }
        );
        assert_eq!(flow.tick(), 59);
        assert_eq!(
            flow.request_otp().await.unwrap_err(),
            FlowError::CooldownActive { remaining: 59 }
        );
        assert_eq!(flow.backend().calls(), vec!["send_otp"]);
        assert_eq!(flow.phase(), FlowPhase::OtpPending);

        drain_cooldown(&flow);
        flow.request_otp().await.unwrap();
        assert_eq!(flow.cooldown_remaining(), 60);
        assert_eq!(flow.backend().calls(), vec!["send_otp", "send_otp"]);
    }

    #[tokio::test]
    async fn ticking_never_changes_phase() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();

        drain_cooldown(&flow);
        assert_eq!(flow.tick(), 0);
        assert_eq!(flow.phase(), FlowPhase::OtpPending);
    }

    #[tokio::test]
    async fn editing_email_invalidates_pending_code() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();

        flow.set_email("b@gmail.com").unwrap();
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);
        assert!(flow.otp_session().is_none());

        let err = flow.verify_otp(CODE).await.unwrap_err();
        assert_eq!(
            err,
            FlowError::InvalidTransition {
                phase: FlowPhase::EmailEntry,
                action: FlowAction::VerifyOtp
            }
        );

        assert!(flow.can_dispatch());
        flow.request_otp().await.unwrap();
        assert_eq!(
            flow.otp_session().map(|otp| otp.email.as_str()),
            Some("b@gmail.com")
        );
        assert_eq!(flow.cooldown_remaining(), 60);
        flow.verify_otp(CODE).await.unwrap();
        assert_eq!(flow.phase(), FlowPhase::ProfileEntry);
    }

    #[tokio::test]
    async fn returning_to_a_cooled_down_email_still_waits() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();
        flow.tick();

        flow.set_email("b@gmail.com").unwrap();
        assert_eq!(flow.cooldown_remaining(), 0);

        flow.set_email("a@gmail.com").unwrap();
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);
        assert_eq!(
            flow.request_otp().await.unwrap_err(),
            FlowError::CooldownActive { remaining: 59 }
        );
        assert_eq!(flow.backend().calls(), vec!["send_otp"]);
    }

    #[tokio::test]
    async fn same_email_resend_still_waits() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();

        flow.set_email("a@gmail.com ").unwrap();
        assert_eq!(
            flow.request_otp().await.unwrap_err(),
            FlowError::CooldownActive { remaining: 60 }
        );
        assert_eq!(flow.phase(), FlowPhase::OtpPending);
    }

    #[tokio::test]
    async fn setting_the_same_email_keeps_the_code() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();

        flow.set_email(" a@gmail.com ").unwrap();
        assert_eq!(flow.phase(), FlowPhase::OtpPending);
        assert!(flow.otp_session().is_some());
    }

    #[tokio::test]
    async fn email_is_locked_after_verification() {
        let mut flow = verified_flow().await;
        let err = flow.set_email("b@gmail.com").unwrap_err();
        assert_eq!(
            err,
            FlowError::InvalidTransition {
                phase: FlowPhase::ProfileEntry,
                action: FlowAction::EditEmail
            }
        );
        assert_eq!(flow.draft().email, "a@gmail.com");
    }

    #[tokio::test]
    async fn reverifying_is_idempotent() {
        let mut flow = verified_flow().await;
        let calls = flow.backend().calls().len();

        flow.verify_otp(CODE).await.unwrap();
        flow.verify_otp("999999").await.unwrap();
        assert_eq!(flow.phase(), FlowPhase::ProfileEntry);
        assert!(flow.is_verified());
        assert_eq!(flow.backend().calls().len(), calls);
    }

    #[tokio::test]
    async fn code_length_is_checked_locally() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();

        let err = flow.verify_otp("123").await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Validation(ValidationError::CodeLength { expected: 6 })
        );
        assert_eq!(flow.backend().calls(), vec!["send_otp"]);
    }

    #[tokio::test]
    async fn each_registration_guard_blocks_submission() {
        let mut flow = verified_flow().await;
        let calls = flow.backend().calls().len();

        // missing name
        flow.set_password(secret("pw")).unwrap();
        flow.set_confirm_password(secret("pw")).unwrap();
        assert_eq!(
            flow.submit_profile().await.unwrap_err(),
            FlowError::Validation(ValidationError::MissingName)
        );

        // empty password
        flow.set_name("Ada").unwrap();
        flow.set_password(secret("  ")).unwrap();
        flow.set_confirm_password(secret("  ")).unwrap();
        assert_eq!(
            flow.submit_profile().await.unwrap_err(),
            FlowError::Validation(ValidationError::MissingPassword)
        );

        // mismatch
        flow.set_password(secret("pw")).unwrap();
        flow.set_confirm_password(secret("wp")).unwrap();
        assert_eq!(
            flow.submit_profile().await.unwrap_err(),
            FlowError::Validation(ValidationError::PasswordMismatch)
        );

        assert_eq!(flow.phase(), FlowPhase::ProfileEntry);
        assert_eq!(flow.backend().calls().len(), calls);
        assert!(!flow.auth().is_authenticated());
    }

    #[tokio::test]
    async fn registration_requires_verification() {
        let mut flow = verified_flow().await;
        flow.set_name("Ada").unwrap();
        flow.set_password(secret("pw")).unwrap();
        flow.set_confirm_password(secret("pw")).unwrap();
        if let Some(otp) = flow.otp.as_mut() {
            otp.verified = false;
        }

        assert_eq!(
            flow.submit_profile().await.unwrap_err(),
            FlowError::Validation(ValidationError::NotVerified)
        );
        assert!(!flow.backend().calls().contains(&"register"));
    }

    #[tokio::test]
    async fn registration_requires_eligible_email() {
        let mut flow = verified_flow().await;
        flow.set_name("Ada").unwrap();
        flow.set_password(secret("pw")).unwrap();
        flow.set_confirm_password(secret("pw")).unwrap();
        flow.draft.email = "a@yahoo.com".to_string();

        assert!(matches!(
            flow.submit_profile().await.unwrap_err(),
            FlowError::Validation(ValidationError::EmailDomain { .. })
        ));
        assert!(!flow.backend().calls().contains(&"register"));
    }

    #[tokio::test]
    async fn submit_outside_profile_entry_is_rejected() {
        let mut flow = flow_with(FakeBackend::default());
        assert_eq!(
            flow.submit_profile().await.unwrap_err(),
            FlowError::InvalidTransition {
                phase: FlowPhase::EmailEntry,
                action: FlowAction::SubmitProfile
            }
        );
    }

    #[tokio::test]
    async fn registration_failure_preserves_fields() {
        let backend = FakeBackend {
            register_error: Some(RegistrationError::Rejected("nope".to_string())),
            ..FakeBackend::default()
        };
        let mut flow = flow_with(backend);
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();
        flow.verify_otp(CODE).await.unwrap();
        flow.set_name("Ada").unwrap();
        flow.set_password(secret("pw")).unwrap();
        flow.set_confirm_password(secret("pw")).unwrap();

        let err = flow.submit_profile().await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Registration(RegistrationError::Rejected("nope".to_string()))
        );
        assert_eq!(flow.phase(), FlowPhase::ProfileEntry);
        assert_eq!(flow.draft().name, "Ada");
        assert_eq!(flow.draft().email, "a@gmail.com");
        assert_eq!(flow.draft().password.expose_secret(), "pw");
        assert!(flow.is_verified());
        assert!(!flow.is_loading());
        assert!(!flow.auth().is_authenticated());
    }

    #[tokio::test]
    async fn already_registered_stays_on_email_entry() {
        let backend = FakeBackend {
            dispatch_error: Some(DispatchError::AlreadyRegistered),
            ..FakeBackend::default()
        };
        let mut flow = flow_with(backend);
        flow.set_email("a@gmail.com").unwrap();

        let err = flow.request_otp().await.unwrap_err();
        assert_eq!(err, FlowError::Dispatch(DispatchError::AlreadyRegistered));
        assert!(!err.is_retryable());
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);
        assert!(flow.can_dispatch());
    }

    #[test]
    fn second_request_while_pending_is_busy() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();

        let ticket = flow.begin_dispatch().unwrap();
        assert_eq!(flow.pending(), Some(FlowAction::RequestOtp));
        assert_eq!(
            flow.begin_dispatch().unwrap_err(),
            FlowError::Busy(FlowAction::RequestOtp)
        );

        flow.complete_dispatch(ticket, Ok(())).unwrap();
        assert!(!flow.is_loading());
        assert_eq!(flow.phase(), FlowPhase::OtpPending);
    }

    #[test]
    fn response_after_email_edit_is_stale() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        let ticket = flow.begin_dispatch().unwrap();

        flow.set_email("b@gmail.com").unwrap();
        assert!(!flow.is_loading());

        assert_eq!(
            flow.complete_dispatch(ticket, Ok(())).unwrap_err(),
            FlowError::Stale
        );
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);
        assert!(flow.otp_session().is_none());
        assert!(flow.can_dispatch());
    }

    #[test]
    fn tickets_from_another_flow_are_stale() {
        let mut first = flow_with(FakeBackend::default());
        let mut second = flow_with(FakeBackend::default());
        first.set_email("a@gmail.com").unwrap();
        second.set_email("a@gmail.com").unwrap();

        let ticket = first.begin_dispatch().unwrap();
        let _other = second.begin_dispatch().unwrap();
        assert_ne!(ticket.flow_id(), second.id());
        assert_eq!(
            second.complete_dispatch(ticket, Ok(())).unwrap_err(),
            FlowError::Stale
        );
        assert_eq!(second.phase(), FlowPhase::EmailEntry);
    }

    #[tokio::test]
    async fn verification_after_email_edit_is_stale() {
        let mut flow = flow_with(FakeBackend::default());
        flow.set_email("a@gmail.com").unwrap();
        flow.request_otp().await.unwrap();
        let ticket = flow.begin_verify(CODE).unwrap();

        flow.set_email("b@gmail.com").unwrap();
        assert_eq!(
            flow.complete_verify(ticket, Ok(())).unwrap_err(),
            FlowError::Stale
        );
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);
        assert!(flow.otp_session().is_none());
        assert!(!flow.is_verified());
        assert!(!flow.is_loading());
    }

    #[tokio::test]
    async fn superseded_registration_never_logs_in() {
        let mut flow = verified_flow().await;
        flow.set_name("Ada").unwrap();
        flow.set_password(secret("pw")).unwrap();
        flow.set_confirm_password(secret("pw")).unwrap();

        let ticket = flow.begin_register().unwrap();
        flow.supersede();

        let session = AuthSession::new(
            "late-token",
            UserIdentity {
                id: "u9".to_string(),
                name: "Ada".to_string(),
                email: "a@gmail.com".to_string(),
                role: None,
            },
        );
        assert_eq!(
            flow.complete_register(ticket, Ok(session)).unwrap_err(),
            FlowError::Stale
        );
        assert!(!flow.auth().is_authenticated());
        assert_eq!(flow.phase(), FlowPhase::ProfileEntry);
        assert_eq!(flow.draft().name, "Ada");
        assert!(flow.is_verified());
        assert!(!flow.is_loading());
    }

    #[tokio::test]
    async fn registration_ticket_from_another_flow_is_stale() {
        let mut first = verified_flow().await;
        let mut second = verified_flow().await;
        for flow in [&mut first, &mut second] {
            flow.set_name("Ada").unwrap();
            flow.set_password(secret("pw")).unwrap();
            flow.set_confirm_password(secret("pw")).unwrap();
        }

        let ticket = first.begin_register().unwrap();
        let session = AuthSession::new(
            "jwt",
            UserIdentity {
                id: "u1".to_string(),
                name: "Ada".to_string(),
                email: "a@gmail.com".to_string(),
                role: None,
            },
        );
        assert_eq!(
            second.complete_register(ticket, Ok(session)).unwrap_err(),
            FlowError::Stale
        );
        assert!(!second.auth().is_authenticated());
        assert_eq!(second.phase(), FlowPhase::ProfileEntry);
    }

    #[tokio::test]
    async fn finished_flow_rejects_edits() {
        let mut flow = verified_flow().await;
        flow.set_name("Ada").unwrap();
        flow.set_password(secret("pw")).unwrap();
        flow.set_confirm_password(secret("pw")).unwrap();
        flow.submit_profile().await.unwrap();

        assert!(matches!(
            flow.set_name("Eve"),
            Err(FlowError::InvalidTransition { .. })
        ));
        assert!(matches!(
            flow.request_otp().await,
            Err(FlowError::InvalidTransition { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_clears_loading() {
        let backend = FakeBackend {
            hang: true,
            ..FakeBackend::default()
        };
        let mut flow = flow_with(backend);
        flow.set_email("a@gmail.com").unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), flow.request_otp()).await;
        assert!(result.is_err());
        assert!(!flow.is_loading());
        assert_eq!(flow.phase(), FlowPhase::EmailEntry);
        assert!(flow.begin_dispatch().is_ok());
    }

    #[test]
    fn phase_and_action_display() {
        assert_eq!(FlowPhase::OtpPending.to_string(), "otp pending");
        assert_eq!(FlowAction::RequestOtp.to_string(), "request a code");
    }
}
