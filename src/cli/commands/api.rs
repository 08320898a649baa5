use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;
use url::Url;

pub const ARG_SERVER_URL: &str = "server-url";
pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout-seconds";

#[derive(Clone, Debug)]
pub struct Options {
    pub server_url: Url,
    pub frontend_url: Url,
    pub request_timeout: Duration,
}

impl Options {
    /// # Errors
    ///
    /// Returns an error if either URL does not parse.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let server_url = matches
            .get_one::<String>(ARG_SERVER_URL)
            .context("missing required argument: --server-url")?;
        let frontend_url = matches
            .get_one::<String>(ARG_FRONTEND_URL)
            .context("missing required argument: --frontend-url")?;
        let timeout = matches
            .get_one::<u64>(ARG_REQUEST_TIMEOUT)
            .copied()
            .unwrap_or(10);

        Ok(Self {
            server_url: Url::parse(server_url).context("invalid --server-url")?,
            frontend_url: Url::parse(frontend_url).context("invalid --frontend-url")?,
            request_timeout: Duration::from_secs(timeout),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SERVER_URL)
                .long("server-url")
                .help("Base URL of the EduFlow API")
                .env("EDUFLOW_SERVER_URL")
                .global(true)
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long("frontend-url")
                .help("Base URL of the EduFlow web app, used for login and post-signup links")
                .env("EDUFLOW_FRONTEND_URL")
                .global(true)
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long("request-timeout-seconds")
                .help("Timeout applied to every API request")
                .env("EDUFLOW_REQUEST_TIMEOUT_SECONDS")
                .global(true)
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
