//! Email error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`Mailer`](super::Mailer) and the transport registry
#[derive(Debug, Error)]
pub enum MailerError {
    /// Malformed or missing transport configuration
    #[error("email configuration error: {0}")]
    Config(String),

    /// Configuration could not be loaded or extracted
    #[error("failed to load email configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// No transport is registered under the requested name
    #[error("email transport '{name}' not found")]
    TransportNotFound {
        /// Name that failed to resolve
        name: String,
    },

    /// A template body could not be rendered
    #[error("failed to render email template '{template}': {source}")]
    Render {
        /// Template identifier that failed
        template: String,
        /// Renderer failure
        #[source]
        source: RenderError,
    },

    /// No usable message could be assembled
    #[error("cannot compose email: {0}")]
    Composition(String),

    /// The transport failed to deliver or record the message
    #[error("transport '{transport}' failed: {source}")]
    TransportIo {
        /// Transport that failed
        transport: String,
        /// Underlying failure
        #[source]
        source: TransportError,
    },
}

impl MailerError {
    /// Create a configuration error from a string message
    #[must_use]
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Create a composition error from a string message
    #[must_use]
    pub fn composition<T: Into<String>>(msg: T) -> Self {
        Self::Composition(msg.into())
    }

    /// Wrap a transport failure with the name of the transport
    #[must_use]
    pub fn transport<T: Into<String>>(transport: T, source: TransportError) -> Self {
        Self::TransportIo {
            transport: transport.into(),
            source,
        }
    }

    /// Whether this error was raised before the message reached a transport
    #[must_use]
    pub const fn is_pre_dispatch(&self) -> bool {
        !matches!(self, Self::TransportIo { .. })
    }
}

impl From<figment::Error> for MailerError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Failures at the transport boundary
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error while writing a capture log
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// SMTP transport error
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// Invalid email address format
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Capture log line could not be parsed
    #[error("malformed capture record at {path}:{line}: {source}")]
    MalformedRecord {
        /// Capture log path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    /// Create an SMTP error from a string message
    #[must_use]
    pub fn smtp<T: Into<String>>(msg: T) -> Self {
        Self::Smtp(msg.into())
    }
}

/// Failures reported by a [`TemplateRenderer`](super::TemplateRenderer)
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template does not exist
    #[error("template not found: {0}")]
    NotFound(String),

    /// Template engine error
    #[error("template render error: {0}")]
    Template(#[from] minijinja::Error),

    /// Render task panicked or was aborted
    #[error("render task failed: {0}")]
    Task(String),

    /// Failure from a host-provided renderer
    #[error("{0}")]
    Other(String),
}

impl RenderError {
    /// Create a renderer error from a string message
    #[must_use]
    pub fn other<T: Into<String>>(msg: T) -> Self {
        Self::Other(msg.into())
    }
}
