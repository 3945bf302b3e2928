//! End-to-end sends through the built-in renderer and capture transport

use std::path::Path;

use chrono::Utc;
use mailhook::config::{LookupPolicy, MailerConfig, TemplateSettings, TransportConfig};
use mailhook::email::{CaptureTransport, Delivery, Mailer, MailerError, MessageOptions};
use serde_json::json;
use tempfile::TempDir;

fn write_template(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

struct Fixture {
    _dir: TempDir,
    capture_dir: std::path::PathBuf,
    config: MailerConfig,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    write_template(
        &templates,
        "welcome/html.jinja",
        "{% if layout %}<div class=\"{{ layout }}\">{% endif %}<h1>Welcome, {{ user }}!</h1>{% if layout %}</div>{% endif %}",
    );
    write_template(&templates, "welcome/text.jinja", "Welcome, {{ user }}!");
    write_template(&templates, "receipt/html.jinja", "<p>Order {{ order }}</p>");

    let capture_dir = dir.path().join("outbox");
    let config = MailerConfig {
        from: Some("noreply@example.com".to_string()),
        capture: true,
        capture_dir: capture_dir.clone(),
        templates: TemplateSettings {
            root: templates,
            extension: "jinja".to_string(),
        },
        transports: vec![
            TransportConfig::capture("default"),
            TransportConfig::capture("marketing").with_from("news@example.com"),
        ],
        ..MailerConfig::default()
    };

    Fixture {
        _dir: dir,
        capture_dir,
        config,
    }
}

#[tokio::test]
async fn welcome_email_is_captured_with_both_bodies() {
    let fixture = fixture();
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();
    let before = Utc::now();

    let receipt = mailer
        .send(
            "welcome",
            json!({ "user": "Ann" }),
            MessageOptions::new().to("ann@x.com").subject("Welcome"),
        )
        .await
        .unwrap();

    assert!(receipt.is_captured());
    assert_eq!(receipt.recipients, vec!["ann@x.com"]);

    let log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    assert!(matches!(&receipt.delivery, Delivery::Captured { log: path, .. } if *path == log));

    let records = CaptureTransport::read_log(&log).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.to, vec!["ann@x.com"]);
    assert_eq!(record.from, "noreply@example.com");
    assert_eq!(record.subject.as_deref(), Some("Welcome"));
    assert_eq!(record.html.as_deref(), Some("<h1>Welcome, Ann!</h1>"));
    assert_eq!(record.text.as_deref(), Some("Welcome, Ann!"));
    assert!(record.sent_at.unwrap() >= before);
}

#[tokio::test]
async fn capture_record_uses_camel_case_keys() {
    let fixture = fixture();
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    mailer
        .send(
            "welcome",
            json!({ "user": "Ann" }),
            MessageOptions::new()
                .to("ann@x.com")
                .reply_to("support@example.com"),
        )
        .await
        .unwrap();

    let log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    let raw = std::fs::read_to_string(log).unwrap();
    let line: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();

    assert!(line["to"].is_array());
    assert!(line.get("sentAt").is_some());
    assert!(line.get("replyTo").is_some());
    assert!(line.get("sent_at").is_none());
}

#[tokio::test]
async fn missing_text_template_sends_html_only() {
    let fixture = fixture();
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    mailer
        .send("receipt", json!({ "order": 42 }), MessageOptions::new().to("a@x.com"))
        .await
        .unwrap();

    let log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    let records = CaptureTransport::read_log(&log).await.unwrap();
    assert_eq!(records[0].html.as_deref(), Some("<p>Order 42</p>"));
    assert!(records[0].text.is_none());
}

#[tokio::test]
async fn unknown_template_is_a_render_error() {
    let fixture = fixture();
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    let err = mailer
        .send("nope", json!({}), MessageOptions::new().to("a@x.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, MailerError::Render { .. }));
    assert!(err.is_pre_dispatch());
    let log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    assert!(CaptureTransport::read_log(&log).await.unwrap().is_empty());
}

#[tokio::test]
async fn layout_is_off_unless_requested() {
    let fixture = fixture();
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    mailer
        .send("welcome", json!({ "user": "Ann" }), MessageOptions::new().to("a@x.com"))
        .await
        .unwrap();
    mailer
        .send(
            "welcome",
            json!({ "user": "Ann", "layout": "branded" }),
            MessageOptions::new().to("a@x.com"),
        )
        .await
        .unwrap();

    let log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    let records = CaptureTransport::read_log(&log).await.unwrap();
    assert_eq!(records[0].html.as_deref(), Some("<h1>Welcome, Ann!</h1>"));
    assert_eq!(
        records[1].html.as_deref(),
        Some("<div class=\"branded\"><h1>Welcome, Ann!</h1></div>")
    );
}

#[tokio::test]
async fn named_transport_writes_its_own_log_and_sender() {
    let fixture = fixture();
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    mailer
        .send(
            "welcome",
            json!({ "user": "Ann" }),
            MessageOptions::new().to("a@x.com").transport("marketing"),
        )
        .await
        .unwrap();

    let default_log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    let marketing_log = CaptureTransport::log_path_for(&fixture.capture_dir, "marketing");
    assert!(CaptureTransport::read_log(&default_log).await.unwrap().is_empty());

    let records = CaptureTransport::read_log(&marketing_log).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].from, "news@example.com");
}

#[tokio::test]
async fn lenient_lookup_falls_back_to_default_log() {
    let mut fixture = fixture();
    fixture.config.lookup = LookupPolicy::Lenient;
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    let receipt = mailer
        .send(
            "welcome",
            json!({ "user": "Ann" }),
            MessageOptions::new().to("a@x.com").transport("bogus"),
        )
        .await
        .unwrap();

    assert_eq!(receipt.transport, "default");
}

#[tokio::test]
async fn concurrent_sends_produce_whole_records() {
    let fixture = fixture();
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let mailer = mailer.clone();
            tokio::spawn(async move {
                mailer
                    .send(
                        "welcome",
                        json!({ "user": format!("user{i}") }),
                        MessageOptions::new().to(&format!("user{i}@x.com")),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    let records = CaptureTransport::read_log(&log).await.unwrap();
    assert_eq!(records.len(), 20);
}

#[tokio::test]
async fn always_send_to_redirects_captured_mail() {
    let mut fixture = fixture();
    fixture.config.always_send_to = Some("qa@example.com".to_string());
    let mailer = Mailer::from_config(fixture.config.clone()).unwrap();

    mailer
        .send(
            "welcome",
            json!({ "user": "Ann" }),
            MessageOptions::new().to("ann@x.com").cc("boss@x.com"),
        )
        .await
        .unwrap();

    let log = CaptureTransport::log_path_for(&fixture.capture_dir, "default");
    let records = CaptureTransport::read_log(&log).await.unwrap();
    assert_eq!(records[0].to, vec!["qa@example.com"]);
    assert!(records[0].cc.is_empty());
}

#[test]
fn config_file_round_trip_builds_mailer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mailhook.toml");
    std::fs::write(
        &path,
        format!(
            r#"
from = "noreply@example.com"
capture = true
capture_dir = "{}"
lookup = "lenient"

[[transports]]
name = "default"
kind = "capture"
"#,
            dir.path().join("outbox").display()
        ),
    )
    .unwrap();

    let config = MailerConfig::load_from(&path).unwrap();
    assert_eq!(config.lookup, LookupPolicy::Lenient);

    let mailer = Mailer::from_config(config).unwrap();
    assert_eq!(mailer.registry().names(), vec!["default"]);
}
