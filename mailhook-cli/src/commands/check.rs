//! Configuration check command

use anyhow::{Context, Result};
use clap::Args;
use console::{style, Emoji};
use mailhook::config::MailerConfig;
use mailhook::email::TransportRegistry;

static SUCCESS: Emoji = Emoji("✓", "√");
static INFO: Emoji = Emoji("ℹ", "i");

/// Validate configuration and list transports
#[derive(Debug, Args)]
pub struct CheckCommand {}

/// One row of the transport table
#[derive(Debug, PartialEq, Eq)]
struct TransportRow {
    name: String,
    mode: &'static str,
    from: String,
    is_default: bool,
}

impl CheckCommand {
    /// Execute the check command
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a transport
    /// cannot be constructed
    pub fn execute(&self, config: MailerConfig) -> Result<()> {
        let registry = TransportRegistry::build(&config).context("Invalid mail configuration")?;

        println!("\n{INFO} Mail transports");
        println!();
        println!("{:<16} {:<8} {:<32}", "Name", "Mode", "Sender");
        println!("{}", "─".repeat(60));

        for row in Self::rows(&config, &registry) {
            let name = if row.is_default {
                format!("{} *", row.name)
            } else {
                row.name
            };
            println!(
                "{:<16} {:<8} {:<32}",
                style(name).cyan(),
                row.mode,
                row.from
            );
        }

        println!();
        println!(
            "  {} lookup, templates in {}",
            style(format!("{:?}", registry.policy()).to_lowercase()).bold(),
            style(config.templates.root.display()).dim()
        );
        if let Some(address) = &config.always_send_to {
            println!(
                "  {} all mail redirected to {}",
                style("!").yellow().bold(),
                style(address).yellow()
            );
        }
        println!();
        println!("{} Configuration OK", style(SUCCESS).green());

        Ok(())
    }

    fn rows(config: &MailerConfig, registry: &TransportRegistry) -> Vec<TransportRow> {
        registry
            .names()
            .into_iter()
            .filter_map(|name| {
                let resolved = registry.lookup(name).ok()?;
                let from = resolved
                    .from
                    .or_else(|| config.from.clone())
                    .unwrap_or_else(|| "(none)".to_string());
                Some(TransportRow {
                    name: name.to_string(),
                    mode: if resolved.transport.is_capture() {
                        "capture"
                    } else {
                        "smtp"
                    },
                    from,
                    is_default: name == registry.default_name(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use mailhook::config::TransportConfig;

    use super::*;

    #[test]
    fn test_rows_resolve_sender_and_mode() {
        let config = MailerConfig {
            from: Some("noreply@example.com".to_string()),
            capture_dir: std::env::temp_dir().join("mailhook-cli-check"),
            transports: vec![
                TransportConfig::capture("default"),
                TransportConfig::capture("news").with_from("news@example.com"),
            ],
            ..MailerConfig::default()
        };
        let registry = TransportRegistry::build(&config).unwrap();

        let rows = CheckCommand::rows(&config, &registry);
        assert_eq!(
            rows,
            vec![
                TransportRow {
                    name: "default".to_string(),
                    mode: "capture",
                    from: "noreply@example.com".to_string(),
                    is_default: true,
                },
                TransportRow {
                    name: "news".to_string(),
                    mode: "capture",
                    from: "news@example.com".to_string(),
                    is_default: false,
                },
            ]
        );
    }

    #[test]
    fn test_execute_rejects_missing_default() {
        let config = MailerConfig {
            transports: vec![TransportConfig::capture("news")],
            ..MailerConfig::default()
        };
        assert!(CheckCommand {}.execute(config).is_err());
    }
}
