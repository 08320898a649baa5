//! Maps parsed arguments to the action to run.

use crate::cli::actions::{google, signup, Action};
use crate::cli::commands;
use anyhow::{anyhow, Result};

/// # Errors
///
/// Returns an error if an argument does not parse into its typed form or no
/// known subcommand was given.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let api = commands::api::Options::parse(matches)?;

    match matches.subcommand() {
        Some((commands::signup::COMMAND, sub)) => {
            let options = commands::signup::Options::parse(sub);
            Ok(Action::Signup(signup::Args {
                server_url: api.server_url,
                frontend_url: api.frontend_url,
                request_timeout: api.request_timeout,
                flow: options.flow,
            }))
        }
        Some((commands::google::COMMAND, sub)) => {
            let options = commands::google::Options::parse(sub);
            Ok(Action::Google(google::Args {
                server_url: api.server_url,
                frontend_url: api.frontend_url,
                callback_port: options.callback_port,
                callback_timeout: options.callback_timeout,
                open_browser: options.open_browser,
            }))
        }
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}
