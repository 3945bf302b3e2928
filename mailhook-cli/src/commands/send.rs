//! Send command

use anyhow::{bail, Context, Result};
use clap::Args;
use console::{style, Emoji};
use mailhook::config::MailerConfig;
use mailhook::email::{Delivery, Mailer, MessageOptions, Receipt};
use serde_json::Value;

static SUCCESS: Emoji = Emoji("✓", "√");

/// Render a template and send it
#[derive(Debug, Args)]
pub struct SendCommand {
    /// Template name, e.g. `welcome` for `welcome/html` and `welcome/text`
    template: String,

    /// Recipient (repeatable)
    #[arg(long, required = true)]
    to: Vec<String>,

    /// Subject line
    #[arg(short, long)]
    subject: Option<String>,

    /// Sender override
    #[arg(long)]
    from: Option<String>,

    /// CC recipient (repeatable)
    #[arg(long)]
    cc: Vec<String>,

    /// BCC recipient (repeatable)
    #[arg(long)]
    bcc: Vec<String>,

    /// Transport name
    #[arg(short, long)]
    transport: Option<String>,

    /// Template data as a JSON object
    #[arg(short, long, default_value = "{}")]
    data: String,

    /// Send the text body only
    #[arg(long)]
    text_only: bool,
}

impl SendCommand {
    /// Execute the send command
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `--data` is not a JSON object
    /// - The mailer cannot be built from configuration
    /// - Rendering, composition or delivery fails
    pub async fn execute(&self, config: MailerConfig) -> Result<()> {
        let data = self.parse_data()?;
        let mailer = Mailer::from_config(config).context("Failed to build mailer")?;

        let receipt = mailer
            .send(&self.template, data, self.options())
            .await
            .with_context(|| format!("Failed to send template '{}'", self.template))?;

        Self::print_receipt(&receipt);
        Ok(())
    }

    fn parse_data(&self) -> Result<Value> {
        let data: Value =
            serde_json::from_str(&self.data).context("--data must be valid JSON")?;
        if !data.is_object() {
            bail!("--data must be a JSON object");
        }
        Ok(data)
    }

    fn options(&self) -> MessageOptions {
        let mut options = MessageOptions {
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            subject: self.subject.clone(),
            from: self.from.clone(),
            transport: self.transport.clone(),
            ..MessageOptions::default()
        };
        if self.text_only {
            options = options.text_only();
        }
        options
    }

    fn print_receipt(receipt: &Receipt) {
        println!(
            "{} Sent via {} to {}",
            style(SUCCESS).green(),
            style(&receipt.transport).cyan(),
            receipt.recipients.join(", ")
        );
        match &receipt.delivery {
            Delivery::Relayed { code, message } => {
                println!("  {} {}", style(code).bold(), message.join(" "));
            }
            Delivery::Captured { log, sent_at } => {
                println!(
                    "  {} at {} in {}",
                    style("captured").yellow(),
                    sent_at.to_rfc3339(),
                    style(log.display()).dim()
                );
            }
        }
    }
}
