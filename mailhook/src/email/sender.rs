//! Transport trait abstraction
//!
//! This module defines the core `Transport` trait that all delivery backends implement.

use async_trait::async_trait;

use super::{ComposedMessage, MailerError, Receipt};

/// Trait for delivering composed messages
///
/// Implemented by the SMTP backend and the capture backend. Both are
/// interchangeable behind `Arc<dyn Transport>` in the registry.
///
/// # Examples
///
/// ```rust,no_run
/// use mailhook::email::{CaptureTransport, ComposedMessage, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = CaptureTransport::new("default", ".tmp");
///
/// let message = ComposedMessage {
///     to: vec!["user@example.com".to_string()],
///     from: "noreply@myapp.com".to_string(),
///     text: Some("Hello, World!".to_string()),
///     ..ComposedMessage::default()
/// };
///
/// let receipt = transport.send(message).await?;
/// assert!(receipt.is_captured());
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name the transport is registered under
    fn name(&self) -> &str;

    /// Whether messages are recorded locally instead of delivered
    fn is_capture(&self) -> bool {
        false
    }

    /// Deliver (or record) a message
    ///
    /// # Errors
    ///
    /// Returns `MailerError::TransportIo` if the message cannot be handed over
    async fn send(&self, message: ComposedMessage) -> Result<Receipt, MailerError>;
}
