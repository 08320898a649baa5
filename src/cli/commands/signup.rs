use crate::signup::{
    cooldown::DEFAULT_COOLDOWN_SECONDS,
    email::{EmailPolicy, DEFAULT_EMAIL_DOMAIN},
    flow::{FlowConfig, DEFAULT_OTP_LENGTH, DEFAULT_POST_SIGNUP_PATH},
};
use clap::{Arg, ArgMatches, Command};

pub const COMMAND: &str = "signup";
pub const ARG_EMAIL_DOMAIN: &str = "email-domain";
pub const ARG_OTP_COOLDOWN: &str = "otp-cooldown-seconds";
pub const ARG_OTP_LENGTH: &str = "otp-length";
pub const ARG_POST_SIGNUP_PATH: &str = "post-signup-path";

#[derive(Clone, Debug)]
pub struct Options {
    pub flow: FlowConfig,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let domain = matches
            .get_one::<String>(ARG_EMAIL_DOMAIN)
            .map_or(DEFAULT_EMAIL_DOMAIN, String::as_str);
        let cooldown_seconds = matches
            .get_one::<u32>(ARG_OTP_COOLDOWN)
            .copied()
            .unwrap_or(DEFAULT_COOLDOWN_SECONDS);
        let otp_length = matches
            .get_one::<u8>(ARG_OTP_LENGTH)
            .map_or(DEFAULT_OTP_LENGTH, |length| usize::from(*length));
        let post_signup_path = matches
            .get_one::<String>(ARG_POST_SIGNUP_PATH)
            .cloned()
            .unwrap_or_else(|| DEFAULT_POST_SIGNUP_PATH.to_string());

        Self {
            flow: FlowConfig {
                policy: EmailPolicy::new(domain),
                cooldown_seconds,
                otp_length,
                post_signup_path,
            },
        }
    }
}

#[must_use]
pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Create an account, verifying the email with a one-time code")
        .arg(
            Arg::new(ARG_EMAIL_DOMAIN)
                .long("email-domain")
                .help("Only addresses on this domain may sign up")
                .env("EDUFLOW_EMAIL_DOMAIN")
                .default_value(DEFAULT_EMAIL_DOMAIN),
        )
        .arg(
            Arg::new(ARG_OTP_COOLDOWN)
                .long("otp-cooldown-seconds")
                .help("Wait between verification code requests")
                .env("EDUFLOW_OTP_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_LENGTH)
                .long("otp-length")
                .help("Number of characters in a verification code")
                .env("EDUFLOW_OTP_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(u8).range(4..=12)),
        )
        .arg(
            Arg::new(ARG_POST_SIGNUP_PATH)
                .long("post-signup-path")
                .help("Web app path shown after the account is created")
                .env("EDUFLOW_POST_SIGNUP_PATH")
                .default_value(DEFAULT_POST_SIGNUP_PATH),
        )
}
