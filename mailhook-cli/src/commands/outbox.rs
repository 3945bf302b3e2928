//! Outbox command: inspect capture logs

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use console::{style, Emoji};
use mailhook::config::MailerConfig;
use mailhook::email::{ComposedMessage, CaptureTransport};

static INFO: Emoji = Emoji("ℹ", "i");

/// Show messages recorded by capture transports
#[derive(Debug, Args)]
pub struct OutboxCommand {
    /// Only show this transport's log
    #[arg(short, long)]
    transport: Option<String>,

    /// Show at most this many messages per transport, newest last
    #[arg(short, long, default_value = "20")]
    limit: usize,

    /// Print raw JSON records
    #[arg(long)]
    json: bool,
}

impl OutboxCommand {
    /// Execute the outbox command
    ///
    /// # Errors
    ///
    /// Returns an error if the named transport is not configured or a
    /// capture log cannot be read
    pub async fn execute(&self, config: &MailerConfig) -> Result<()> {
        for (name, path) in self.logs(config)? {
            let records = CaptureTransport::read_log(&path)
                .await
                .with_context(|| format!("Failed to read capture log {}", path.display()))?;
            let shown = tail(&records, self.limit);

            if self.json {
                for record in shown {
                    println!("{}", serde_json::to_string(record)?);
                }
                continue;
            }

            println!(
                "\n{INFO} {} ({} captured, {})",
                style(&name).cyan().bold(),
                records.len(),
                style(path.display()).dim()
            );
            println!("{}", "─".repeat(80));
            if shown.is_empty() {
                println!("  {}", style("(No messages captured)").dim());
            }
            for record in shown {
                println!("{}", summary(record));
            }
        }
        Ok(())
    }

    fn logs(&self, config: &MailerConfig) -> Result<Vec<(String, PathBuf)>> {
        let names: Vec<String> = match &self.transport {
            Some(name) => {
                if !config.transport_configs().iter().any(|t| &t.name == name) {
                    bail!("Transport '{name}' is not configured");
                }
                vec![name.clone()]
            }
            None => config
                .transport_configs()
                .into_iter()
                .filter(|t| t.captures(config.capture))
                .map(|t| t.name)
                .collect(),
        };

        Ok(names
            .into_iter()
            .map(|name| {
                let path = CaptureTransport::log_path_for(&config.capture_dir, &name);
                (name, path)
            })
            .collect())
    }
}

fn tail(records: &[ComposedMessage], limit: usize) -> &[ComposedMessage] {
    &records[records.len().saturating_sub(limit)..]
}

fn summary(record: &ComposedMessage) -> String {
    let when = record
        .sent_at
        .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M:%S").to_string());
    let body = match (record.html.is_some(), record.text.is_some()) {
        (true, true) => "html+text",
        (true, false) => "html",
        (false, true) => "text",
        (false, false) => "empty",
    };
    format!(
        "{:<20} {:<30} {:<10} {}",
        when,
        record.to.join(", "),
        body,
        record.subject.as_deref().unwrap_or("(no subject)")
    )
}
