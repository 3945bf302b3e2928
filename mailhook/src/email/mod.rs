//! Email composition and delivery
//!
//! A send flows through three pieces:
//!
//! - [`TemplateRenderer`] turns `<template>/html` and `<template>/text` into bodies
//! - [`TransportRegistry`] maps transport names to live [`Transport`]s
//! - [`Mailer`] merges options, renders, and dispatches
//!
//! Two transports ship with the crate: [`SmtpTransport`] relays through an
//! SMTP server and [`CaptureTransport`] appends each message to a
//! JSON-lines log instead of delivering it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mailhook::config::MailerConfig;
//! use mailhook::email::{Mailer, MessageOptions};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), mailhook::email::MailerError> {
//! let mailer = Mailer::from_config(MailerConfig::load()?)?;
//!
//! mailer
//!     .send(
//!         "password_reset",
//!         json!({ "link": "https://example.com/reset/abc" }),
//!         MessageOptions::new().to("user@example.com").subject("Reset your password"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod composer;
mod error;
mod message;
mod registry;
mod render;
mod sender;

pub use backend::capture::CaptureTransport;
pub use backend::smtp::{text_from_html, SmtpTransport};
pub use composer::{Mailer, MailerBuilder, SendStage};
pub use error::{MailerError, RenderError, TransportError};
pub use message::{ComposedMessage, Delivery, MessageOptions, Receipt};
pub use registry::{ResolvedTransport, TransportRegistry};
pub use render::{MiniJinjaRenderer, TemplateRenderer};
pub use sender::Transport;
