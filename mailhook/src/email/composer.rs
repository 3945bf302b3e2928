//! Message composition and dispatch
//!
//! [`Mailer`] is the entry point of the crate: it resolves a transport,
//! renders the HTML and text bodies concurrently, merges options into a
//! [`ComposedMessage`] and hands it to the transport.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, trace, warn};

use super::{
    ComposedMessage, MailerError, MessageOptions, MiniJinjaRenderer, Receipt, ResolvedTransport,
    TemplateRenderer, TransportRegistry,
};
use crate::config::{HtmlFailurePolicy, MailerConfig};

/// Stages a single send passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    /// Looking up the transport and sender
    Resolving,
    /// Rendering the HTML and text bodies
    Rendering,
    /// Merging options and bodies into a message
    Composing,
    /// Handing the message to the transport
    Dispatching,
    /// Transport accepted the message
    Delivered,
    /// The send stopped with an error
    Failed,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Resolving => "resolving",
            Self::Rendering => "rendering",
            Self::Composing => "composing",
            Self::Dispatching => "dispatching",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        f.write_str(stage)
    }
}

struct Inner {
    registry: TransportRegistry,
    renderer: Arc<dyn TemplateRenderer>,
    from: Option<String>,
    always_send_to: Option<String>,
    html_failure: HtmlFailurePolicy,
}

/// Template-driven email composer
///
/// Cheap to clone; clones share the registry and renderer.
///
/// # Examples
///
/// ```rust,no_run
/// use mailhook::config::{MailerConfig, TransportConfig};
/// use mailhook::email::{Mailer, MessageOptions};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), mailhook::email::MailerError> {
/// let config = MailerConfig {
///     from: Some("noreply@example.com".to_string()),
///     transports: vec![TransportConfig::capture("default")],
///     ..MailerConfig::default()
/// };
/// let mailer = Mailer::from_config(config)?;
///
/// mailer
///     .send(
///         "welcome",
///         json!({ "user": "Ann" }),
///         MessageOptions::new().to("ann@example.com").subject("Welcome"),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Mailer {
    inner: Arc<Inner>,
}

impl fmt::Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailer")
            .field("registry", &self.inner.registry)
            .field("from", &self.inner.from)
            .field("always_send_to", &self.inner.always_send_to)
            .field("html_failure", &self.inner.html_failure)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Mailer`]
///
/// A renderer or registry supplied here replaces the one the
/// configuration would otherwise produce.
pub struct MailerBuilder {
    config: MailerConfig,
    renderer: Option<Arc<dyn TemplateRenderer>>,
    registry: Option<TransportRegistry>,
}

impl MailerBuilder {
    /// Use a host-provided renderer instead of the built-in engine
    #[must_use]
    pub fn renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Use a shared host-provided renderer
    #[must_use]
    pub fn shared_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Use a pre-built registry instead of building one from configuration
    #[must_use]
    pub fn registry(mut self, registry: TransportRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the mailer
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Config` if the transport registry cannot be built
    pub fn build(self) -> Result<Mailer, MailerError> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => TransportRegistry::build(&self.config)?,
        };

        let renderer = self.renderer.unwrap_or_else(|| {
            debug!(
                root = %self.config.templates.root.display(),
                "Using built-in template renderer"
            );
            Arc::new(MiniJinjaRenderer::new(&self.config.templates))
        });

        Ok(Mailer {
            inner: Arc::new(Inner {
                registry,
                renderer,
                from: self.config.from,
                always_send_to: self.config.always_send_to,
                html_failure: self.config.html_failure,
            }),
        })
    }
}

impl Mailer {
    /// Start building a mailer from configuration
    #[must_use]
    pub const fn builder(config: MailerConfig) -> MailerBuilder {
        MailerBuilder {
            config,
            renderer: None,
            registry: None,
        }
    }

    /// Build a mailer with the built-in renderer and configured transports
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Config` if the transport registry cannot be built
    pub fn from_config(config: MailerConfig) -> Result<Self, MailerError> {
        Self::builder(config).build()
    }

    /// Transport registry in use
    #[must_use]
    pub fn registry(&self) -> &TransportRegistry {
        &self.inner.registry
    }

    /// Render `template` with `data` and send it
    ///
    /// Renders `<template>/html` and `<template>/text` concurrently (only
    /// the text variant when `options.text_only` is set). A failed text
    /// render is tolerated when the HTML rendered; a failed HTML render is
    /// handled according to [`HtmlFailurePolicy`].
    ///
    /// Bodies supplied in `options` replace the rendered ones; a body that is
    /// supplied is not required to render.
    ///
    /// `data` must be a JSON object or null. `layout` defaults to `false`.
    ///
    /// # Errors
    ///
    /// - `MailerError::TransportNotFound` if the transport does not resolve
    /// - `MailerError::Render` if a required body fails to render
    /// - `MailerError::Composition` if no sender, recipient or body is available
    /// - `MailerError::TransportIo` if the transport fails
    #[instrument(name = "mailhook.send", skip_all, fields(template = %template))]
    pub async fn send(
        &self,
        template: &str,
        data: Value,
        options: MessageOptions,
    ) -> Result<Receipt, MailerError> {
        let result = self.compose_and_dispatch(template, data, options).await;
        Self::finish(&result);
        result
    }

    /// Send an already composed message
    ///
    /// Skips rendering. The transport is resolved from `transport` (or the
    /// default), an empty `from` is filled from the transport and global
    /// defaults, and the always-send-to override applies as usual.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), minus render errors
    #[instrument(name = "mailhook.send_message", skip_all)]
    pub async fn send_message(
        &self,
        message: ComposedMessage,
        transport: Option<&str>,
    ) -> Result<Receipt, MailerError> {
        let result = self.dispatch_composed(message, transport).await;
        Self::finish(&result);
        result
    }

    async fn dispatch_composed(
        &self,
        mut message: ComposedMessage,
        transport: Option<&str>,
    ) -> Result<Receipt, MailerError> {
        trace!(stage = %SendStage::Resolving);
        let resolved = self.resolve_transport(transport)?;
        let explicit_from = Some(message.from.clone()).filter(|from| !from.is_empty());
        message.from = self.resolve_sender(explicit_from, &resolved)?;

        trace!(stage = %SendStage::Composing);
        let message = self.finalize(message)?;

        self.dispatch(&resolved, message).await
    }

    async fn compose_and_dispatch(
        &self,
        template: &str,
        data: Value,
        options: MessageOptions,
    ) -> Result<Receipt, MailerError> {
        trace!(stage = %SendStage::Resolving);
        let data = Self::prepare_data(data)?;
        let resolved = self.resolve_transport(options.transport.as_deref())?;
        let from = self.resolve_sender(options.from.clone(), &resolved)?;

        trace!(stage = %SendStage::Rendering);
        let (html, text) = self
            .render_bodies(
                template,
                &data,
                (options.html, options.text),
                options.text_only,
            )
            .await?;

        trace!(stage = %SendStage::Composing);
        let message = self.finalize(ComposedMessage {
            to: options.to,
            from,
            subject: options.subject,
            html,
            text,
            cc: options.cc,
            bcc: options.bcc,
            reply_to: options.reply_to,
            headers: options.headers,
            sent_at: None,
        })?;

        self.dispatch(&resolved, message).await
    }

    fn prepare_data(data: Value) -> Result<Value, MailerError> {
        let mut context = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(MailerError::composition(format!(
                    "template data must be a JSON object, got {other}"
                )))
            }
        };
        // Layout wrapping is opt-in.
        context.entry("layout").or_insert(Value::Bool(false));
        Ok(Value::Object(context))
    }

    fn resolve_transport(&self, requested: Option<&str>) -> Result<ResolvedTransport, MailerError> {
        let registry = &self.inner.registry;
        let name = requested.unwrap_or_else(|| registry.default_name());
        registry.lookup(name)
    }

    /// Call > transport > global
    fn resolve_sender(
        &self,
        explicit: Option<String>,
        resolved: &ResolvedTransport,
    ) -> Result<String, MailerError> {
        explicit
            .or_else(|| resolved.from.clone())
            .or_else(|| self.inner.from.clone())
            .ok_or_else(|| {
                MailerError::composition(format!(
                    "no sender address: set `from` on the call, on transport '{}', or globally",
                    resolved.name
                ))
            })
    }

    /// Render the bodies the caller did not supply
    ///
    /// `text_only` suppresses the HTML render.
    async fn render_bodies(
        &self,
        template: &str,
        data: &Value,
        supplied: (Option<String>, Option<String>),
        text_only: bool,
    ) -> Result<(Option<String>, Option<String>), MailerError> {
        let renderer = &self.inner.renderer;
        let html_id = format!("{template}/html");
        let text_id = format!("{template}/text");
        let (supplied_html, supplied_text) = supplied;

        let render_html = supplied_html.is_none() && !text_only;
        let render_text = supplied_text.is_none();

        let (html, text) = tokio::join!(
            async {
                if render_html {
                    Some(renderer.render(&html_id, data).await)
                } else {
                    None
                }
            },
            async {
                if render_text {
                    Some(renderer.render(&text_id, data).await)
                } else {
                    None
                }
            }
        );

        let text = match text {
            None => supplied_text,
            Some(Ok(body)) => Some(body),
            Some(Err(source)) if text_only => {
                return Err(MailerError::Render {
                    template: text_id,
                    source,
                })
            }
            Some(Err(e)) => {
                debug!(template = %text_id, error = %e, "Text body unavailable");
                None
            }
        };

        let html = match html {
            None => supplied_html,
            Some(Ok(body)) => Some(body),
            Some(Err(e))
                if text.is_some() && self.inner.html_failure == HtmlFailurePolicy::Degrade =>
            {
                warn!(template = %html_id, error = %e, "HTML body failed to render, sending text only");
                None
            }
            Some(Err(source)) => {
                return Err(MailerError::Render {
                    template: html_id,
                    source,
                })
            }
        };

        Ok((html, text))
    }

    /// Apply the always-send-to override and check the message is sendable
    fn finalize(&self, mut message: ComposedMessage) -> Result<ComposedMessage, MailerError> {
        if let Some(address) = &self.inner.always_send_to {
            if !message.cc.is_empty() || !message.bcc.is_empty() {
                debug!(redirect = %address, "Dropping CC/BCC recipients for always-send-to override");
            }
            message.to = vec![address.clone()];
            message.cc.clear();
            message.bcc.clear();
        }

        if message.to.is_empty() {
            return Err(MailerError::composition("message has no recipients"));
        }
        if !message.has_body() {
            return Err(MailerError::composition(
                "message has neither an HTML nor a text body",
            ));
        }
        Ok(message)
    }

    async fn dispatch(
        &self,
        resolved: &ResolvedTransport,
        message: ComposedMessage,
    ) -> Result<Receipt, MailerError> {
        trace!(stage = %SendStage::Dispatching, transport = %resolved.name);
        debug!(
            transport = %resolved.name,
            from = %message.from,
            to = ?message.to,
            subject = ?message.subject,
            "Dispatching email"
        );
        resolved.transport.send(message).await
    }

    fn finish(result: &Result<Receipt, MailerError>) {
        match result {
            Ok(receipt) => {
                trace!(stage = %SendStage::Delivered);
                info!(
                    transport = %receipt.transport,
                    recipients = ?receipt.recipients,
                    captured = receipt.is_captured(),
                    "Email sent"
                );
            }
            Err(e) => {
                trace!(stage = %SendStage::Failed);
                debug!(error = %e, "Email send failed");
            }
        }
    }
}
