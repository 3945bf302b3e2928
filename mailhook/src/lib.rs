//! mailhook: template-driven email dispatch
//!
//! Renders a named template into HTML and plain text bodies, picks a
//! transport from a registry of named transports, merges default and
//! per-call options, and hands the composed message to the transport.
//!
//! Non-production environments swap real SMTP delivery for a capture
//! transport that appends every outgoing message to a JSON-lines log, so
//! application code and its test suite can run the whole send path and
//! inspect what would have been sent.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mailhook::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     mailhook::observability::init()?;
//!
//!     let config = MailerConfig::load()?;
//!     let mailer = Mailer::from_config(config)?;
//!
//!     let receipt = mailer
//!         .send(
//!             "welcome",
//!             json!({ "user": "Ann" }),
//!             MessageOptions::new().to("ann@example.com").subject("Welcome!"),
//!         )
//!         .await?;
//!
//!     tracing::info!(transport = %receipt.transport, "sent");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`config`]: typed configuration loaded with figment
//! - [`email`]: transports, registry, renderer and the [`email::Mailer`] composer
//! - [`observability`]: tracing subscriber setup
//! - [`testing`]: in-memory transport and renderer for downstream tests

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod email;
pub mod observability;
pub mod testing;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{HtmlFailurePolicy, LookupPolicy, MailerConfig, TransportConfig};
    pub use crate::email::{
        ComposedMessage, Mailer, MailerError, MessageOptions, Receipt, TemplateRenderer,
        Transport,
    };
}
