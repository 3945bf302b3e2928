//! CLI command implementations

pub mod check;
pub mod outbox;
pub mod send;

use std::path::Path;

use anyhow::{Context, Result};
use mailhook::config::MailerConfig;

pub use check::CheckCommand;
pub use outbox::OutboxCommand;
pub use send::SendCommand;

/// Load configuration from `path`, or from the standard locations
pub fn load_config(path: Option<&Path>) -> Result<MailerConfig> {
    match path {
        Some(path) => MailerConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => MailerConfig::load().context("Failed to load configuration"),
    }
}
