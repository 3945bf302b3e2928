//! SMTP backend for delivering emails
//!
//! Uses the `lettre` crate with a pooled async SMTP transport.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use lettre::{
    message::{
        header::{self, HeaderName, HeaderValue},
        Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use regex::Regex;
use tracing::info;

use crate::config::{SmtpSettings, TlsMode};
use crate::email::{ComposedMessage, Delivery, MailerError, Receipt, Transport, TransportError};

/// SMTP email backend
///
/// The connection pool is created once, when the transport is built.
/// Building must happen inside a Tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use mailhook::config::SmtpSettings;
/// use mailhook::email::SmtpTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = SmtpSettings {
///     host: Some("smtp.example.com".to_string()),
///     username: Some("user@example.com".to_string()),
///     password: Some("password123".to_string()),
///     ..SmtpSettings::default()
/// };
/// let transport = SmtpTransport::new("default", &settings)?;
/// # Ok(())
/// # }
/// ```
pub struct SmtpTransport {
    name: String,
    endpoint: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl SmtpTransport {
    /// Create an SMTP transport from connection settings
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Config` if the endpoint cannot be resolved or
    /// the TLS parameters are invalid
    pub fn new(name: impl Into<String>, settings: &SmtpSettings) -> Result<Self, MailerError> {
        let name = name.into();
        let endpoint = settings
            .endpoint()
            .map_err(|e| MailerError::config(format!("transport '{name}': {e}")))?;

        let mut builder = match endpoint.tls {
            TlsMode::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&endpoint.host)
                .map_err(|e| MailerError::config(format!("transport '{name}': {e}")))?,
            TlsMode::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host)
                .map_err(|e| MailerError::config(format!("transport '{name}': {e}")))?,
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&endpoint.host),
        };

        builder = builder.port(endpoint.port);

        if let Some((username, password)) = settings.credentials() {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                password.to_string(),
            ));
        }

        Ok(Self {
            endpoint: format!("{}:{}", endpoint.host, endpoint.port),
            name,
            mailer: builder.build(),
        })
    }

    /// `host:port` this transport connects to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build a lettre `Message` from a composed message
    fn build_message(message: &ComposedMessage) -> Result<Message, TransportError> {
        let mut builder = Message::builder().from(parse_mailbox(&message.from)?);

        for to in &message.to {
            builder = builder.to(parse_mailbox(to)?);
        }
        for cc in &message.cc {
            builder = builder.cc(parse_mailbox(cc)?);
        }
        for bcc in &message.bcc {
            builder = builder.bcc(parse_mailbox(bcc)?);
        }
        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(parse_mailbox(reply_to)?);
        }
        if let Some(subject) = &message.subject {
            builder = builder.subject(subject);
        }

        for (name, value) in &message.headers {
            let name = HeaderName::new_from_ascii(name.clone())
                .map_err(|e| TransportError::smtp(format!("invalid header '{name}': {e}")))?;
            builder = builder.raw_header(HeaderValue::new(name, value.clone()));
        }

        // A missing text part is derived from the HTML.
        let text = message
            .text
            .clone()
            .or_else(|| message.html.as_deref().map(text_from_html));

        let built = match (&message.html, text) {
            (Some(html), Some(text)) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            (Some(html), None) => builder
                .header(header::ContentType::TEXT_HTML)
                .body(html.clone()),
            (None, Some(text)) => builder.header(header::ContentType::TEXT_PLAIN).body(text),
            (None, None) => return Err(TransportError::smtp("message has no body")),
        };

        built.map_err(|e| TransportError::smtp(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|_| TransportError::InvalidAddress(address.to_string()))
}

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|table|ul|ol)\s*>").expect("valid regex")
});
static INVISIBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head)\b.*?</(script|style|head)\s*>").expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"));

/// Derive a plain text alternative from an HTML body
#[must_use]
pub fn text_from_html(html: &str) -> String {
    let visible = INVISIBLE.replace_all(html, "");
    let broken = BLOCK_BREAK.replace_all(&visible, "\n");
    let stripped = TAG.replace_all(&broken, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    BLANK_LINES
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: ComposedMessage) -> Result<Receipt, MailerError> {
        let email =
            Self::build_message(&message).map_err(|e| MailerError::transport(&self.name, e))?;

        let response = self
            .mailer
            .send(email)
            .await
            .map_err(|e| MailerError::transport(&self.name, TransportError::smtp(e.to_string())))?;

        info!(
            transport = %self.name,
            endpoint = %self.endpoint,
            from = %message.from,
            to = ?message.to,
            code = %response.code(),
            "Email relayed"
        );

        Ok(Receipt {
            transport: self.name.clone(),
            recipients: message.recipients(),
            delivery: Delivery::Relayed {
                code: response.code().to_string(),
                message: response.message().map(str::to_string).collect(),
            },
        })
    }
}
