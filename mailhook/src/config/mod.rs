//! Configuration management for mailhook
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `MAILHOOK_` prefix, `__` for nesting)
//! 2. `./mailhook.toml` (project)
//! 3. `~/.config/mailhook/config.toml` (user config, XDG)
//! 4. Hardcoded defaults (fallback)
//!
//! Unknown keys are rejected rather than silently ignored.
//!
//! # Example Configuration
//!
//! ```toml
//! default_transport = "default"
//! from = "noreply@example.com"
//! capture = false
//! lookup = "lenient"
//!
//! [templates]
//! root = "views/emailTemplates"
//!
//! [[transports]]
//! name = "default"
//! from = "team@example.com"
//!
//! [transports.smtp]
//! service = "gmail"
//! username = "me@gmail.com"
//! password = "app-password"
//!
//! [[transports]]
//! name = "audit"
//! kind = "capture"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::email::MailerError;

/// Name of the project-local configuration file
pub const LOCAL_CONFIG_FILE: &str = "mailhook.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "MAILHOOK_";

/// Top-level keys that `MAILHOOK_*` variables may override
const ENV_KEYS: &[&str] = &[
    "default_transport",
    "from",
    "always_send_to",
    "capture",
    "capture_dir",
    "lookup",
    "html_failure",
    "templates",
    "smtp",
    "transports",
];

/// Whether a prefix-stripped variable name targets a configuration key
fn is_config_key(key: &str) -> bool {
    let top = key.split("__").next().unwrap_or_default();
    let top = top.split('.').next().unwrap_or_default();
    ENV_KEYS.iter().any(|known| known.eq_ignore_ascii_case(top))
}

/// What to do when a requested transport name is not registered
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LookupPolicy {
    /// Unknown names are an error
    #[default]
    Strict,
    /// Unknown names fall back to the default transport with a warning
    Lenient,
}

/// What to do when the HTML body fails to render
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HtmlFailurePolicy {
    /// Surface the render error to the caller
    #[default]
    Fatal,
    /// Continue with the text body alone when it rendered
    Degrade,
}

/// Backend kind of a configured transport
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Real delivery over SMTP
    #[default]
    #[serde(alias = "real")]
    Smtp,
    /// Append to a local capture log, never deliver
    Capture,
}

/// SMTP connection security
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain connection upgraded with STARTTLS (usually port 587)
    #[default]
    Starttls,
    /// Implicit TLS from the first byte (usually port 465)
    Wrapper,
    /// No encryption; local relays and test servers only
    None,
}

impl TlsMode {
    /// Conventional port for this mode
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Starttls => 587,
            Self::Wrapper => 465,
            Self::None => 25,
        }
    }
}

/// SMTP connection parameters for a transport
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpSettings {
    /// Well-known provider name (`gmail`, `outlook`, `sendgrid`, ...)
    pub service: Option<String>,

    /// SMTP server hostname; overrides the service preset
    pub host: Option<String>,

    /// SMTP server port; defaults to the preset or the TLS mode's port
    pub port: Option<u16>,

    /// SMTP username
    pub username: Option<String>,

    /// SMTP password
    pub password: Option<String>,

    /// Connection security; defaults to the preset or STARTTLS
    pub tls: Option<TlsMode>,
}

/// Fully resolved SMTP endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    /// Server hostname
    pub host: String,
    /// Server port
    pub port: u16,
    /// Connection security
    pub tls: TlsMode,
}

/// Host, port and TLS mode of the well-known SMTP services
const WELL_KNOWN_SERVICES: &[(&str, &str, u16, TlsMode)] = &[
    ("gmail", "smtp.gmail.com", 465, TlsMode::Wrapper),
    ("outlook", "smtp-mail.outlook.com", 587, TlsMode::Starttls),
    ("hotmail", "smtp-mail.outlook.com", 587, TlsMode::Starttls),
    ("yahoo", "smtp.mail.yahoo.com", 465, TlsMode::Wrapper),
    ("sendgrid", "smtp.sendgrid.net", 587, TlsMode::Starttls),
    ("mailgun", "smtp.mailgun.org", 465, TlsMode::Wrapper),
    ("postmark", "smtp.postmarkapp.com", 2525, TlsMode::Starttls),
    ("ses", "email-smtp.us-east-1.amazonaws.com", 465, TlsMode::Wrapper),
];

impl SmtpSettings {
    /// Resolve the endpoint from an explicit host or a service preset
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Config` if neither a host nor a known service is set
    pub fn endpoint(&self) -> Result<SmtpEndpoint, MailerError> {
        let preset = match &self.service {
            Some(service) => Some(
                WELL_KNOWN_SERVICES
                    .iter()
                    .find(|(name, ..)| name.eq_ignore_ascii_case(service))
                    .ok_or_else(|| {
                        MailerError::config(format!("unknown SMTP service '{service}'"))
                    })?,
            ),
            None => None,
        };

        let host = match (&self.host, preset) {
            (Some(host), _) => host.clone(),
            (None, Some((_, host, ..))) => (*host).to_string(),
            (None, None) => {
                return Err(MailerError::config(
                    "SMTP transport needs either `host` or `service`",
                ))
            }
        };

        let tls = self
            .tls
            .or_else(|| preset.map(|(.., tls)| *tls))
            .unwrap_or_default();

        // An explicit host does not inherit the preset's port.
        let port = self.port.unwrap_or_else(|| match (&self.host, preset) {
            (None, Some((_, _, port, _))) => *port,
            _ => tls.default_port(),
        });

        Ok(SmtpEndpoint { host, port, tls })
    }

    /// Username and password, when both are configured
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Configuration of one named transport
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Unique name within the registry
    pub name: String,

    /// Backend kind
    #[serde(default)]
    pub kind: TransportKind,

    /// SMTP parameters (ignored for capture transports)
    #[serde(default)]
    pub smtp: SmtpSettings,

    /// Sender override for messages sent through this transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Capture flag; `None` inherits the global `capture` default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<bool>,
}

impl TransportConfig {
    /// Create an SMTP transport config
    #[must_use]
    pub fn smtp(name: impl Into<String>, smtp: SmtpSettings) -> Self {
        Self {
            name: name.into(),
            kind: TransportKind::Smtp,
            smtp,
            ..Self::default()
        }
    }

    /// Create a capture transport config
    #[must_use]
    pub fn capture(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TransportKind::Capture,
            ..Self::default()
        }
    }

    /// Set the per-transport sender override
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the explicit capture flag
    #[must_use]
    pub const fn with_capture(mut self, capture: bool) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Whether this transport records instead of delivering
    ///
    /// An explicit flag wins; an unset flag inherits `global_default`.
    #[must_use]
    pub fn captures(&self, global_default: bool) -> bool {
        self.kind == TransportKind::Capture || self.capture.unwrap_or(global_default)
    }
}

/// Template engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSettings {
    /// Directory that template identifiers are resolved against
    pub root: PathBuf,

    /// File extension appended to template identifiers
    pub extension: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("views/emailTemplates"),
            extension: "jinja".to_string(),
        }
    }
}

/// Complete mailer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MailerConfig {
    /// Transport used when a send does not name one
    pub default_transport: String,

    /// Registry-wide default sender
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Redirect every message to this address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_send_to: Option<String>,

    /// Global capture-mode default for transports without an explicit flag
    pub capture: bool,

    /// Directory holding capture logs
    pub capture_dir: PathBuf,

    /// Behaviour for unknown transport names
    pub lookup: LookupPolicy,

    /// Behaviour when the HTML body fails to render
    pub html_failure: HtmlFailurePolicy,

    /// Template engine settings
    pub templates: TemplateSettings,

    /// Single-transport shorthand used when `transports` is empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpSettings>,

    /// Named transports
    pub transports: Vec<TransportConfig>,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            default_transport: "default".to_string(),
            from: None,
            always_send_to: None,
            capture: cfg!(debug_assertions),
            capture_dir: PathBuf::from(".tmp"),
            lookup: LookupPolicy::default(),
            html_failure: HtmlFailurePolicy::default(),
            templates: TemplateSettings::default(),
            smtp: None,
            transports: Vec::new(),
        }
    }
}

impl MailerConfig {
    /// Load configuration from the standard locations
    ///
    /// Precedence, lowest first: defaults, `~/.config/mailhook/config.toml`,
    /// `./mailhook.toml`, `MAILHOOK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be parsed or a value
    /// has the wrong type or an unknown key
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use mailhook::config::MailerConfig;
    ///
    /// # fn example() -> Result<(), mailhook::email::MailerError> {
    /// let config = MailerConfig::load()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load() -> Result<Self, MailerError> {
        let mut figment = Self::defaults()?;

        let user_config = Self::recommended_path();
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        Self::extract(figment.merge(Self::env()))
    }

    /// Load configuration from a specific file, with environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, MailerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MailerError::config(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }

        Self::load_layered(path, ENV_PREFIX)
    }

    fn load_layered(path: &Path, env_prefix: &str) -> Result<Self, MailerError> {
        Self::extract(
            Self::defaults()?
                .merge(Toml::file(path))
                .merge(Self::env_with_prefix(env_prefix)),
        )
    }

    /// Parse configuration from a TOML string, without environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has unknown keys
    pub fn from_toml_str(source: &str) -> Result<Self, MailerError> {
        Self::extract(Self::defaults()?.merge(Toml::string(source)))
    }

    /// Get the recommended XDG config path
    #[must_use]
    pub fn recommended_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(LOCAL_CONFIG_FILE),
            |config_dir| config_dir.join("mailhook").join("config.toml"),
        )
    }

    /// Transport configurations, with the single-transport shorthand expanded
    ///
    /// When no `[[transports]]` are configured, one transport named after
    /// `default_transport` is built from the top-level `[smtp]` table.
    #[must_use]
    pub fn transport_configs(&self) -> Vec<TransportConfig> {
        if !self.transports.is_empty() {
            return self.transports.clone();
        }

        match &self.smtp {
            Some(smtp) => vec![TransportConfig::smtp(&self.default_transport, smtp.clone())],
            None if self.capture => vec![TransportConfig::capture(&self.default_transport)],
            None => Vec::new(),
        }
    }

    /// Configuration of the named transport, if any
    #[must_use]
    pub fn transport(&self, name: &str) -> Option<&TransportConfig> {
        self.transports.iter().find(|t| t.name == name)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Config` if:
    /// - no transports are configured
    /// - a transport name is empty or duplicated
    /// - the default transport is not configured
    /// - a delivering SMTP transport has no resolvable host
    pub fn validate(&self) -> Result<(), MailerError> {
        let transports = self.transport_configs();
        if transports.is_empty() {
            return Err(MailerError::config(
                "no transports configured; add [[transports]] or an [smtp] table",
            ));
        }

        let mut seen = HashSet::new();
        for transport in &transports {
            if transport.name.trim().is_empty() {
                return Err(MailerError::config("transport name must not be empty"));
            }
            if transport.name.contains(['/', '\\']) {
                return Err(MailerError::config(format!(
                    "transport name '{}' must not contain path separators",
                    transport.name
                )));
            }
            if !seen.insert(transport.name.as_str()) {
                return Err(MailerError::config(format!(
                    "duplicate transport name '{}'",
                    transport.name
                )));
            }
            if !transport.captures(self.capture) {
                transport.smtp.endpoint().map_err(|e| {
                    MailerError::config(format!("transport '{}': {e}", transport.name))
                })?;
            }
        }

        if !seen.contains(self.default_transport.as_str()) {
            return Err(MailerError::config(format!(
                "default transport '{}' is not configured",
                self.default_transport
            )));
        }

        Ok(())
    }

    fn defaults() -> Result<Figment, MailerError> {
        let defaults = toml::to_string(&Self::default())
            .map_err(|e| MailerError::config(format!("cannot serialize defaults: {e}")))?;
        Ok(Figment::new().merge(Toml::string(&defaults)))
    }

    fn env() -> Env {
        Self::env_with_prefix(ENV_PREFIX)
    }

    /// Unrelated variables sharing the prefix are ignored.
    fn env_with_prefix(prefix: &str) -> Env {
        Env::prefixed(prefix)
            .filter(|key| is_config_key(key.as_str()))
            .split("__")
            .lowercase(true)
    }

    fn extract(figment: Figment) -> Result<Self, MailerError> {
        Ok(figment.extract()?)
    }
}
