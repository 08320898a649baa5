//! Terminal prompts and output. Prompts block, so they run on the blocking
//! pool while the cooldown ticker keeps going.

use crate::signup::{Notice, NoticeLevel};
use anyhow::{Context, Result};
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use secrecy::SecretString;
use std::future::Future;

/// Reads a line of text. `allow_empty` lets an empty answer through.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub async fn input(prompt: impl Into<String>, allow_empty: bool) -> Result<String> {
    let prompt = prompt.into();
    tokio::task::spawn_blocking(move || {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty(allow_empty)
            .interact_text()
    })
    .await
    .context("prompt task failed")?
    .context("failed to read input")
}

/// Reads a hidden value.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub async fn password(prompt: impl Into<String>) -> Result<SecretString> {
    let prompt = prompt.into();
    let value = tokio::task::spawn_blocking(move || {
        Password::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
    })
    .await
    .context("prompt task failed")?
    .context("failed to read password")?;

    Ok(SecretString::from(value))
}

pub fn header(message: &str) {
    println!();
    println!("{}", style(message).bold());
}

pub fn info(message: &str) {
    println!("{}", style(message).cyan());
}

pub fn notice(notice: &Notice) {
    let title = match notice.level {
        NoticeLevel::Success => style(notice.title.as_str()).green().bold(),
        NoticeLevel::Info => style(notice.title.as_str()).cyan().bold(),
        NoticeLevel::Error => style(notice.title.as_str()).red().bold(),
    };
    println!("{title} {}", notice.description);
}

/// Prints `label` while `future` runs, mirroring a button's loading state.
pub async fn with_status<F: Future>(label: &str, future: F) -> F::Output {
    println!("{}", style(format!("{label}...")).dim());
    future.await
}
