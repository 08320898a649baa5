use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const COMMAND: &str = "google";
pub const ARG_CALLBACK_PORT: &str = "callback-port";
pub const ARG_CALLBACK_TIMEOUT: &str = "callback-timeout-seconds";
pub const ARG_NO_BROWSER: &str = "no-browser";

#[derive(Clone, Copy, Debug)]
pub struct Options {
    pub callback_port: u16,
    pub callback_timeout: Duration,
    pub open_browser: bool,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            callback_port: matches
                .get_one::<u16>(ARG_CALLBACK_PORT)
                .copied()
                .unwrap_or(8765),
            callback_timeout: Duration::from_secs(
                matches
                    .get_one::<u64>(ARG_CALLBACK_TIMEOUT)
                    .copied()
                    .unwrap_or(300),
            ),
            open_browser: !matches.get_flag(ARG_NO_BROWSER),
        }
    }
}

#[must_use]
pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Sign in with Google instead of verifying an email code")
        .arg(
            Arg::new(ARG_CALLBACK_PORT)
                .long("callback-port")
                .help("Local port that receives the sign-in redirect")
                .env("EDUFLOW_CALLBACK_PORT")
                .default_value("8765")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_CALLBACK_TIMEOUT)
                .long("callback-timeout-seconds")
                .help("How long to wait for the redirect")
                .env("EDUFLOW_CALLBACK_TIMEOUT_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_NO_BROWSER)
                .long("no-browser")
                .help("Print the sign-in URL instead of opening a browser")
                .action(ArgAction::SetTrue),
        )
}
