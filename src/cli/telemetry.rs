//! Logging setup. Output goes to stderr so it never interleaves with prompts
//! on stdout. `RUST_LOG` overrides the verbosity flag.

use crate::cli::commands::logging::LogFormat;
use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(verbosity_level: Option<tracing::Level>, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(tracing::Level::ERROR).into())
        .from_env_lossy();

    let registry = Registry::default().with(env_filter);

    match format {
        LogFormat::Text => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_target(false);
            tracing::subscriber::set_global_default(registry.with(fmt_layer))?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_target(false);
            tracing::subscriber::set_global_default(registry.with(fmt_layer))?;
        }
    }

    Ok(())
}
