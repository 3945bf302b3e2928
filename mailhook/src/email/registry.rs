//! Named transport registry
//!
//! Built once from configuration and read-only afterwards, so it can be
//! shared across concurrent sends without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::{CaptureTransport, MailerError, SmtpTransport, Transport};
use crate::config::{LookupPolicy, MailerConfig};

struct Entry {
    transport: Arc<dyn Transport>,
    from: Option<String>,
}

/// A transport resolved by [`TransportRegistry::lookup`]
#[derive(Clone)]
pub struct ResolvedTransport {
    /// Name the transport is registered under
    pub name: String,

    /// The transport itself
    pub transport: Arc<dyn Transport>,

    /// Per-transport sender override
    pub from: Option<String>,

    /// Whether the requested name was missing and the default was used
    pub fell_back: bool,
}

impl fmt::Debug for ResolvedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTransport")
            .field("name", &self.name)
            .field("capture", &self.transport.is_capture())
            .field("from", &self.from)
            .field("fell_back", &self.fell_back)
            .finish()
    }
}

/// Immutable map of transport name to live transport
///
/// # Examples
///
/// ```rust
/// use mailhook::config::{MailerConfig, TransportConfig};
/// use mailhook::email::TransportRegistry;
///
/// # fn example() -> Result<(), mailhook::email::MailerError> {
/// let config = MailerConfig {
///     transports: vec![TransportConfig::capture("default")],
///     ..MailerConfig::default()
/// };
///
/// let registry = TransportRegistry::build(&config)?;
/// let resolved = registry.lookup("default")?;
/// assert!(resolved.transport.is_capture());
/// # Ok(())
/// # }
/// ```
pub struct TransportRegistry {
    entries: HashMap<String, Entry>,
    default_name: String,
    policy: LookupPolicy,
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("transports", &self.names())
            .field("default_name", &self.default_name)
            .field("policy", &self.policy)
            .finish()
    }
}

impl TransportRegistry {
    /// Build the registry from configuration
    ///
    /// Each transport config yields exactly one live transport. Transports
    /// in capture mode get a [`CaptureTransport`] writing under
    /// `capture_dir`; the rest get an [`SmtpTransport`]. Any construction
    /// failure aborts the whole build.
    ///
    /// Must run inside a Tokio runtime when SMTP transports are configured.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Config` if the configuration is invalid, the
    /// default transport is missing, or an SMTP backend cannot be created
    pub fn build(config: &MailerConfig) -> Result<Self, MailerError> {
        config.validate()?;

        let mut transports = Vec::new();
        for transport_config in config.transport_configs() {
            let name = transport_config.name.clone();
            let transport: Arc<dyn Transport> = if transport_config.captures(config.capture) {
                Arc::new(CaptureTransport::new(&name, &config.capture_dir))
            } else {
                Arc::new(SmtpTransport::new(&name, &transport_config.smtp)?)
            };

            info!(
                transport = %name,
                capture = transport.is_capture(),
                "Registered email transport"
            );
            transports.push((transport, transport_config.from));
        }

        Self::from_transports(&config.default_transport, config.lookup, transports)
    }

    /// Build a registry from already constructed transports
    ///
    /// Each transport is paired with its optional sender override.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Config` on duplicate names or a missing default
    pub fn from_transports<I>(
        default_name: impl Into<String>,
        policy: LookupPolicy,
        transports: I,
    ) -> Result<Self, MailerError>
    where
        I: IntoIterator<Item = (Arc<dyn Transport>, Option<String>)>,
    {
        let default_name = default_name.into();
        let mut entries = HashMap::new();

        for (transport, from) in transports {
            let name = transport.name().to_string();
            if entries.insert(name.clone(), Entry { transport, from }).is_some() {
                return Err(MailerError::config(format!(
                    "duplicate transport name '{name}'"
                )));
            }
        }

        if !entries.contains_key(&default_name) {
            return Err(MailerError::config(format!(
                "default transport '{default_name}' is not configured"
            )));
        }

        Ok(Self {
            entries,
            default_name,
            policy,
        })
    }

    /// Resolve a transport by name
    ///
    /// Under [`LookupPolicy::Strict`] an unknown name is an error. Under
    /// [`LookupPolicy::Lenient`] it logs a warning and resolves the default
    /// transport instead.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::TransportNotFound` if neither the name nor (when
    /// lenient) the default resolves
    pub fn lookup(&self, name: &str) -> Result<ResolvedTransport, MailerError> {
        if let Some(entry) = self.entries.get(name) {
            return Ok(Self::resolved(name, entry, false));
        }

        match self.policy {
            LookupPolicy::Strict => Err(MailerError::TransportNotFound {
                name: name.to_string(),
            }),
            LookupPolicy::Lenient => {
                let entry = self.entries.get(&self.default_name).ok_or_else(|| {
                    MailerError::TransportNotFound {
                        name: self.default_name.clone(),
                    }
                })?;
                warn!(
                    requested = %name,
                    fallback = %self.default_name,
                    "Email transport not found, falling back to default"
                );
                Ok(Self::resolved(&self.default_name, entry, true))
            }
        }
    }

    /// Resolve the default transport
    ///
    /// # Errors
    ///
    /// Never fails for a registry built through [`build`](Self::build) or
    /// [`from_transports`](Self::from_transports)
    pub fn default_transport(&self) -> Result<ResolvedTransport, MailerError> {
        self.lookup(&self.default_name)
    }

    fn resolved(name: &str, entry: &Entry, fell_back: bool) -> ResolvedTransport {
        ResolvedTransport {
            name: name.to_string(),
            transport: Arc::clone(&entry.transport),
            from: entry.from.clone(),
            fell_back,
        }
    }

    /// Name of the default transport
    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Lookup policy in effect
    #[must_use]
    pub const fn policy(&self) -> LookupPolicy {
        self.policy
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether a transport is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Sender override configured for `name`
    #[must_use]
    pub fn transport_from(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(|e| e.from.as_deref())
    }

    /// Number of registered transports
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(super) mod tests {
    use std::io;
    use std::sync::Mutex;

    use proptest::prelude::*;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::config::{SmtpSettings, TransportConfig};

    /// Log sink for asserting on emitted events
    #[derive(Clone, Default)]
    pub(in crate::email) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        /// Subscriber writing plain WARN-and-above lines into this sink
        pub(in crate::email) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::WARN)
                .finish()
        }

        pub(in crate::email) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn config_with(transports: Vec<TransportConfig>) -> MailerConfig {
        MailerConfig {
            capture: false,
            capture_dir: std::env::temp_dir().join("mailhook-registry-tests"),
            transports,
            ..MailerConfig::default()
        }
    }

    fn smtp_settings() -> SmtpSettings {
        SmtpSettings {
            host: Some("smtp.example.com".to_string()),
            ..SmtpSettings::default()
        }
    }

    #[test]
    fn test_build_with_default_entry() {
        let registry =
            TransportRegistry::build(&config_with(vec![TransportConfig::capture("default")]))
                .unwrap();
        let resolved = registry.lookup("default").unwrap();
        assert_eq!(resolved.name, "default");
        assert!(!resolved.fell_back);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_build_missing_default_fails() {
        let result =
            TransportRegistry::build(&config_with(vec![TransportConfig::capture("marketing")]));
        assert!(matches!(result, Err(MailerError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_mixes_smtp_and_capture() {
        let registry = TransportRegistry::build(&config_with(vec![
            TransportConfig::smtp("default", smtp_settings()).with_from("team@example.com"),
            TransportConfig::capture("audit"),
        ]))
        .unwrap();

        assert!(!registry.lookup("default").unwrap().transport.is_capture());
        assert!(registry.lookup("audit").unwrap().transport.is_capture());
        assert_eq!(registry.transport_from("default"), Some("team@example.com"));
        assert_eq!(registry.transport_from("audit"), None);
        assert_eq!(registry.names(), vec!["audit", "default"]);
    }

    #[test]
    fn test_global_capture_substitutes_smtp_backend() {
        let mut config = config_with(vec![TransportConfig::smtp("default", smtp_settings())]);
        config.capture = true;

        let registry = TransportRegistry::build(&config).unwrap();
        assert!(registry.lookup("default").unwrap().transport.is_capture());
    }

    #[tokio::test]
    async fn test_explicit_capture_off_overrides_global_default() {
        let mut config = config_with(vec![
            TransportConfig::smtp("default", smtp_settings()).with_capture(false),
            TransportConfig::smtp("other", smtp_settings()),
        ]);
        config.capture = true;

        let registry = TransportRegistry::build(&config).unwrap();
        assert!(!registry.lookup("default").unwrap().transport.is_capture());
        assert!(registry.lookup("other").unwrap().transport.is_capture());
    }

    #[tokio::test]
    async fn test_backend_error_aborts_build() {
        let result = TransportRegistry::build(&config_with(vec![
            TransportConfig::capture("default"),
            TransportConfig::smtp(
                "broken",
                SmtpSettings {
                    service: Some("pigeon".to_string()),
                    ..SmtpSettings::default()
                },
            ),
        ]));
        assert!(matches!(result, Err(MailerError::Config(msg)) if msg.contains("broken")));
    }

    #[test]
    fn test_strict_lookup_unknown_name() {
        let registry =
            TransportRegistry::build(&config_with(vec![TransportConfig::capture("default")]))
                .unwrap();
        let err = registry.lookup("bogus").unwrap_err();
        assert!(matches!(err, MailerError::TransportNotFound { name } if name == "bogus"));
    }

    #[test]
    fn test_lenient_lookup_falls_back_to_default() {
        let mut config = config_with(vec![TransportConfig::capture("default")]);
        config.lookup = LookupPolicy::Lenient;

        let registry = TransportRegistry::build(&config).unwrap();
        let logs = CapturedLogs::default();
        let resolved =
            tracing::subscriber::with_default(logs.subscriber(), || registry.lookup("bogus"))
                .unwrap();

        assert_eq!(resolved.name, "default");
        assert!(resolved.fell_back);
        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("falling back to default"));
        assert!(output.contains("bogus"));
    }

    #[test]
    fn test_strict_lookup_does_not_warn() {
        let registry =
            TransportRegistry::build(&config_with(vec![TransportConfig::capture("default")]))
                .unwrap();
        let logs = CapturedLogs::default();
        let result =
            tracing::subscriber::with_default(logs.subscriber(), || registry.lookup("bogus"));

        assert!(result.is_err());
        assert!(logs.contents().is_empty());
    }

    #[test]
    fn test_from_transports_rejects_duplicates() {
        let first: Arc<dyn Transport> = Arc::new(CaptureTransport::new("default", "/tmp"));
        let second: Arc<dyn Transport> = Arc::new(CaptureTransport::new("default", "/tmp"));

        let result = TransportRegistry::from_transports(
            "default",
            LookupPolicy::Strict,
            vec![(first, None), (second, None)],
        );
        assert!(matches!(result, Err(MailerError::Config(_))));
    }

    proptest! {
        #[test]
        fn prop_build_succeeds_iff_default_present(
            names in proptest::collection::hash_set("[a-z]{1,8}", 1..6),
            include_default in any::<bool>(),
        ) {
            let mut transports: Vec<TransportConfig> = names
                .iter()
                .filter(|n| n.as_str() != "default")
                .map(TransportConfig::capture)
                .collect();
            if include_default {
                transports.push(TransportConfig::capture("default"));
            }

            let result = TransportRegistry::build(&config_with(transports));
            if include_default {
                let registry = result.unwrap();
                prop_assert!(registry.lookup("default").is_ok());
            } else {
                prop_assert!(matches!(result, Err(MailerError::Config(_))));
            }
        }
    }
}
