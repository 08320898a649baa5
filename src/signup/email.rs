//! Email domain policy. Verification trust is anchored to a single mail
//! provider, so only addresses on that provider's domain may start a signup.

use regex::Regex;
use std::sync::OnceLock;

/// Domain accepted when no override is configured.
pub const DEFAULT_EMAIL_DOMAIN: &str = "gmail.com";

fn address_shape() -> Option<&'static Regex> {
    static SHAPE: OnceLock<Option<Regex>> = OnceLock::new();
    SHAPE
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

/// Accepts addresses that end in `@<domain>` for one fixed domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailPolicy {
    suffix: String,
}

impl EmailPolicy {
    /// Builds a policy for `domain`. A leading `@` is tolerated.
    #[must_use]
    pub fn new(domain: &str) -> Self {
        let domain = domain.trim().trim_start_matches('@').to_ascii_lowercase();
        Self {
            suffix: format!("@{domain}"),
        }
    }

    /// The required suffix, including the `@`.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// The required domain, without the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.suffix.trim_start_matches('@')
    }

    /// Pure predicate: true when `email` is a well-formed address on the
    /// configured domain.
    #[must_use]
    pub fn is_eligible(&self, email: &str) -> bool {
        let email = email.trim();
        if email.len() <= self.suffix.len() {
            return false;
        }
        if !address_shape().is_some_and(|re| re.is_match(email)) {
            return false;
        }

        let split = email.len() - self.suffix.len();
        match (email.get(..split), email.get(split..)) {
            (Some(local), Some(domain)) => {
                !local.is_empty() && domain.eq_ignore_ascii_case(&self.suffix)
            }
            // split landed inside a multi-byte character
            _ => false,
        }
    }
}

impl Default for EmailPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EMAIL_DOMAIN)
    }
}

/// Trims whitespace so the same address is sent to every endpoint.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}
