//! Message types: per-call options, the composed message, and delivery receipts

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-call delivery options
///
/// Built with the same fluent style as the message itself:
///
/// ```rust
/// use mailhook::email::MessageOptions;
///
/// let options = MessageOptions::new()
///     .to("user@example.com")
///     .subject("Welcome!")
///     .transport("marketing");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageOptions {
    /// Recipients (To)
    pub to: Vec<String>,

    /// Sender override; wins over transport and global defaults
    pub from: Option<String>,

    /// Subject line
    pub subject: Option<String>,

    /// CC recipients
    pub cc: Vec<String>,

    /// BCC recipients
    pub bcc: Vec<String>,

    /// Reply-To address
    pub reply_to: Option<String>,

    /// Custom headers, passed through to the transport
    pub headers: Vec<(String, String)>,

    /// HTML body; replaces the rendered one
    pub html: Option<String>,

    /// Plain text body; replaces the rendered one
    pub text: Option<String>,

    /// Transport name override
    pub transport: Option<String>,

    /// Skip HTML rendering and send the text body alone
    pub text_only: bool,
}

impl MessageOptions {
    /// Create empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient (To)
    #[must_use]
    pub fn to(mut self, address: &str) -> Self {
        self.to.push(address.to_string());
        self
    }

    /// Add multiple recipients (To)
    #[must_use]
    pub fn to_multiple(mut self, addresses: &[&str]) -> Self {
        self.to.extend(addresses.iter().map(|a| (*a).to_string()));
        self
    }

    /// Set the sender (From)
    #[must_use]
    pub fn from(mut self, address: &str) -> Self {
        self.from = Some(address.to_string());
        self
    }

    /// Set the subject
    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Add a CC recipient
    #[must_use]
    pub fn cc(mut self, address: &str) -> Self {
        self.cc.push(address.to_string());
        self
    }

    /// Add a BCC recipient
    #[must_use]
    pub fn bcc(mut self, address: &str) -> Self {
        self.bcc.push(address.to_string());
        self
    }

    /// Set the Reply-To address
    #[must_use]
    pub fn reply_to(mut self, address: &str) -> Self {
        self.reply_to = Some(address.to_string());
        self
    }

    /// Add a custom header
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Supply the HTML body instead of rendering it
    #[must_use]
    pub fn html(mut self, body: &str) -> Self {
        self.html = Some(body.to_string());
        self
    }

    /// Supply the plain text body instead of rendering it
    #[must_use]
    pub fn text(mut self, body: &str) -> Self {
        self.text = Some(body.to_string());
        self
    }

    /// Send through the named transport instead of the default
    #[must_use]
    pub fn transport(mut self, name: &str) -> Self {
        self.transport = Some(name.to_string());
        self
    }

    /// Render and send only the plain text body
    #[must_use]
    pub const fn text_only(mut self) -> Self {
        self.text_only = true;
        self
    }
}

/// A fully composed message, ready for a transport
///
/// Serialized with camelCase keys; this is also the capture log record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedMessage {
    /// Recipients (To)
    pub to: Vec<String>,

    /// Resolved sender
    pub from: String,

    /// Subject line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// HTML body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Plain text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// CC recipients
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,

    /// BCC recipients
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,

    /// Reply-To address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    /// Custom headers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,

    /// When a capture transport recorded the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl ComposedMessage {
    /// Whether the message carries at least one body
    #[must_use]
    pub const fn has_body(&self) -> bool {
        self.html.is_some() || self.text.is_some()
    }

    /// Every address the message will be delivered to
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .cloned()
            .collect()
    }
}

/// Outcome reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Delivery {
    /// Accepted by an SMTP server
    Relayed {
        /// Final SMTP reply code
        code: String,
        /// Reply text lines
        message: Vec<String>,
    },
    /// Recorded in a capture log, not delivered
    Captured {
        /// Capture log the record was appended to
        log: PathBuf,
        /// Timestamp written into the record
        sent_at: DateTime<Utc>,
    },
}

/// Delivery receipt returned from a successful send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transport that handled the message
    pub transport: String,

    /// Addresses the message was handed over for
    pub recipients: Vec<String>,

    /// Transport-specific outcome
    pub delivery: Delivery,
}

impl Receipt {
    /// Whether the message was only captured
    #[must_use]
    pub const fn is_captured(&self) -> bool {
        matches!(self.delivery, Delivery::Captured { .. })
    }
}
