//! Testing utilities for code that sends email
//!
//! Provides an in-memory transport and an in-memory template renderer so
//! test suites can drive [`Mailer`](crate::email::Mailer) without SMTP or
//! template files on disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use minijinja::{AutoEscape, Environment, ErrorKind};
use serde_json::Value;

use crate::email::{
    ComposedMessage, Delivery, MailerError, Receipt, RenderError, TemplateRenderer, Transport,
    TransportError,
};

/// Transport that records sent messages in memory
///
/// # Examples
///
/// ```rust
/// use mailhook::email::{ComposedMessage, Transport};
/// use mailhook::testing::RecordingTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = RecordingTransport::new("default");
///
/// let message = ComposedMessage {
///     to: vec!["user@example.com".to_string()],
///     from: "noreply@myapp.com".to_string(),
///     text: Some("Hello".to_string()),
///     ..ComposedMessage::default()
/// };
/// transport.send(message).await?;
///
/// assert_eq!(transport.sent_count(), 1);
/// assert!(transport.was_sent_to("user@example.com"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    name: String,
    sent: Arc<Mutex<Vec<ComposedMessage>>>,
    failure: Option<String>,
}

impl RecordingTransport {
    /// Create a recording transport
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: Arc::default(),
            failure: None,
        }
    }

    /// Create a transport whose every send fails with an SMTP error
    #[must_use]
    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new(name)
        }
    }

    /// Get the number of messages sent
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Get all sent messages
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn sent_messages(&self) -> Vec<ComposedMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Get the last sent message
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn last_sent(&self) -> Option<ComposedMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Check if a message was sent to a specific address
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn was_sent_to(&self, address: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .any(|message| message.to.iter().any(|to| to == address))
    }

    /// Clear all recorded messages
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: ComposedMessage) -> Result<Receipt, MailerError> {
        if let Some(reason) = &self.failure {
            return Err(MailerError::transport(
                &self.name,
                TransportError::smtp(reason.clone()),
            ));
        }

        let recipients = message.recipients();
        self.sent.lock().unwrap().push(message);

        Ok(Receipt {
            transport: self.name.clone(),
            recipients,
            delivery: Delivery::Relayed {
                code: "250".to_string(),
                message: vec!["OK: recorded".to_string()],
            },
        })
    }
}

/// Renderer serving templates registered in memory
///
/// Templates use minijinja syntax. Identifiers ending in `/html` are
/// auto-escaped. Identifiers registered with [`failing`](Self::failing)
/// always fail; unknown identifiers report `RenderError::NotFound`.
///
/// ```rust
/// use mailhook::testing::StaticRenderer;
///
/// let renderer = StaticRenderer::new()
///     .template("welcome/html", "<p>Hi {{ user }}</p>")
///     .failing("welcome/text", "no text variant");
/// ```
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    env: Environment<'static>,
    failures: HashMap<String, String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for StaticRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticRenderer {
    /// Create a renderer with no templates
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|name| {
            if name.ends_with("/html") {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });
        Self {
            env,
            failures: HashMap::new(),
            calls: Arc::default(),
        }
    }

    /// Register a template source under an identifier
    ///
    /// # Panics
    ///
    /// Panics if the template does not parse
    #[must_use]
    pub fn template(mut self, identifier: &str, source: &str) -> Self {
        self.env
            .add_template_owned(identifier.to_string(), source.to_string())
            .unwrap();
        self
    }

    /// Make an identifier fail to render
    #[must_use]
    pub fn failing(mut self, identifier: &str, reason: &str) -> Self {
        self.failures
            .insert(identifier.to_string(), reason.to_string());
        self
    }

    /// Identifiers requested so far, in call order
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether an identifier has been requested
    #[must_use]
    pub fn was_rendered(&self, identifier: &str) -> bool {
        self.calls().iter().any(|call| call == identifier)
    }
}

#[async_trait]
impl TemplateRenderer for StaticRenderer {
    async fn render(&self, identifier: &str, data: &Value) -> Result<String, RenderError> {
        self.calls.lock().unwrap().push(identifier.to_string());

        if let Some(reason) = self.failures.get(identifier) {
            return Err(RenderError::other(reason.clone()));
        }

        let template = self.env.get_template(identifier).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                RenderError::NotFound(identifier.to_string())
            } else {
                RenderError::Template(e)
            }
        })?;
        Ok(template.render(data)?)
    }
}
