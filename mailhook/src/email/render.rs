//! Template rendering
//!
//! [`Mailer`](super::Mailer) renders two bodies per send, addressed as
//! `<template>/html` and `<template>/text`. Any templating technology can
//! sit behind [`TemplateRenderer`]; [`MiniJinjaRenderer`] is the built-in
//! engine used when the host does not register its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use minijinja::{path_loader, AutoEscape, Environment, ErrorKind};
use serde_json::Value;

use super::RenderError;
use crate::config::TemplateSettings;

/// Renders a template identifier and a data context into a string
///
/// Implementations must be side-effect free as far as the caller can tell:
/// the same identifier and data either render or fail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    /// Render `identifier` with `data`
    ///
    /// # Errors
    ///
    /// Returns `RenderError::NotFound` when the template does not exist and
    /// another variant when rendering fails
    async fn render(&self, identifier: &str, data: &Value) -> Result<String, RenderError>;
}

/// Built-in renderer backed by minijinja
///
/// Resolves `<root>/<identifier>.<extension>` from disk. Loaded templates
/// are cached by the environment. HTML variants (`.../html.<extension>`)
/// are auto-escaped; text variants are not.
///
/// ```text
/// views/emailTemplates/
/// └── welcome/
///     ├── html.jinja
///     └── text.jinja
/// ```
#[derive(Debug, Clone)]
pub struct MiniJinjaRenderer {
    env: Arc<Environment<'static>>,
    root: PathBuf,
    extension: String,
}

impl MiniJinjaRenderer {
    /// Create a renderer from template settings
    #[must_use]
    pub fn new(settings: &TemplateSettings) -> Self {
        let extension = settings.extension.trim_start_matches('.').to_string();

        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_loader(path_loader(&settings.root));

        let html_file = format!("html.{extension}");
        env.set_auto_escape_callback(move |name| {
            if name.rsplit('/').next() == Some(html_file.as_str()) {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });

        Self {
            env: Arc::new(env),
            root: settings.root.clone(),
            extension,
        }
    }

    /// Directory templates are resolved against
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Template file name for an identifier
    #[must_use]
    pub fn file_name(&self, identifier: &str) -> String {
        format!("{identifier}.{}", self.extension)
    }
}

#[async_trait]
impl TemplateRenderer for MiniJinjaRenderer {
    async fn render(&self, identifier: &str, data: &Value) -> Result<String, RenderError> {
        let name = self.file_name(identifier);
        let env = Arc::clone(&self.env);
        let data = data.clone();

        // Template loading touches the filesystem and rendering is CPU bound.
        tokio::task::spawn_blocking(move || -> Result<String, RenderError> {
            let template = env.get_template(&name).map_err(|e| {
                if e.kind() == ErrorKind::TemplateNotFound {
                    RenderError::NotFound(name.clone())
                } else {
                    RenderError::Template(e)
                }
            })?;
            Ok(template.render(&data)?)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
    }
}
