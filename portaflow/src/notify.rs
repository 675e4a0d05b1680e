//! Outbound email via the provider's transactional HTTP API.
//!
//! Sends are best-effort on the intake path: the caller records the outcome
//! per channel instead of failing the whole request. Without an API key
//! configured, sends are skipped and reported as such, which keeps local
//! development working without provider credentials.

use serde_json::{Value, json};
use std::sync::Once;

use crate::config::EmailConfig;
use crate::errors::{Error, Result};

// reqwest is built without a default rustls provider; building a Client
// panics unless one is installed process-wide first
static CRYPTO_PROVIDER: Once = Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// What happened to one outbound email.
#[derive(Debug)]
pub enum SendOutcome {
    /// Provider accepted the message; carries the provider's response body
    Sent(Value),
    /// No API key configured, nothing was sent
    Skipped,
}

/// One email to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub cc: Option<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
}

pub struct Mailer {
    http: reqwest::Client,
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        ensure_crypto_provider();
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Operations inbox for the full-detail notification.
    pub fn mesa_recipient(&self) -> &str {
        &self.config.mesa_recipient
    }

    /// Optional CC for the operations notification.
    pub fn cc_operaciones(&self) -> Option<&str> {
        self.config.cc_operaciones.as_deref()
    }

    /// Send one transactional email. Blank recipients are filtered out first;
    /// an empty recipient list is an error rather than a silent no-op.
    pub async fn send(&self, message: &EmailMessage) -> Result<SendOutcome> {
        let recipients: Vec<&str> = message.to.iter().map(|r| r.trim()).filter(|r| !r.is_empty()).collect();
        if recipients.is_empty() {
            return Err(Error::MissingRecipient);
        }

        let Some(api_key) = &self.config.api_key else {
            tracing::info!(subject = %message.subject, "Email API key not configured, skipping send");
            return Ok(SendOutcome::Skipped);
        };

        let mut payload = json!({
            "sender": { "email": self.config.from_email, "name": self.config.from_name },
            "to": recipients.iter().map(|r| json!({ "email": r })).collect::<Vec<_>>(),
            "subject": message.subject,
            "htmlContent": message.html,
        });
        if let Some(cc) = message.cc.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            payload["cc"] = json!([{ "email": cc }]);
        }
        if let Some(reply_to) = message.reply_to.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            payload["replyTo"] = json!({ "email": reply_to });
        }

        let response = self
            .http
            .post(self.config.api_url.clone())
            .header("api-key", api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notification {
                message: format!("Email API request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification {
                message: format!("Email API {}: {}", status.as_u16(), body),
            });
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok(SendOutcome::Sent(body))
    }
}
