//! Outgoing mail through SendGrid.
//!
//! [`Mailer`] never fails: every outcome, including a missing API key or an
//! unreachable provider, is reported as a [`MailStatus`] the model can read.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::{AgentsError, Result};
use crate::tool::{typed_tool, TypedFunctionTool};

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com";
pub const API_KEY_VAR: &str = "SENDGRID_API_KEY";
pub const FROM_ADDRESS_VAR: &str = "MAIL_FROM_ADDRESS";

/// Credentials and sender identity for the mail provider.
#[derive(Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub from_address: String,
    pub endpoint: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("from_address", &self.from_address)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl MailConfig {
    pub fn new(api_key: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from_address: from_address.into(),
            endpoint: SENDGRID_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

/// A message ready for delivery. `html` is filled from `text` when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl MailMessage {
    pub fn new(
        to: Vec<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
        html: Option<String>,
    ) -> Self {
        let text = text.into();
        let html = html.unwrap_or_else(|| text.clone());
        Self {
            to,
            subject: subject.into(),
            text,
            html,
        }
    }

    /// The v3 `mail/send` request body.
    pub fn sendgrid_body(&self, from: &str) -> Value {
        let to: Vec<Value> = self.to.iter().map(|email| json!({ "email": email })).collect();
        json!({
            "personalizations": [{ "to": to }],
            "from": { "email": from },
            "subject": self.subject,
            "content": [
                { "type": "text/plain", "value": self.text },
                { "type": "text/html", "value": self.html },
            ],
        })
    }
}

/// What the provider said about a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Seam over the mail provider.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Submit a message. `Err` means the provider was never reached.
    async fn deliver(&self, message: &MailMessage) -> Result<TransportResponse>;
}

/// POSTs to `{endpoint}/v3/mail/send` with bearer auth.
#[derive(Debug, Clone)]
pub struct SendGridTransport {
    http: reqwest::Client,
    config: MailConfig,
}

impl SendGridTransport {
    pub fn new(config: MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn with_client(http: reqwest::Client, config: MailConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }
}

#[async_trait]
impl MailTransport for SendGridTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<TransportResponse> {
        let url = format!("{}/v3/mail/send", self.config.endpoint);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&message.sendgrid_body(&self.config.from_address))
            .send()
            .await
            .map_err(|e| AgentsError::external("SendGrid", e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AgentsError::external("SendGrid", e.to_string()))?;
        Ok(TransportResponse { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailOutcome {
    Success,
    Error,
}

/// Tagged result of a send, serialized for the model as
/// `{status, message, status_code?, details?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailStatus {
    pub status: MailOutcome,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl MailStatus {
    pub fn is_success(&self) -> bool {
        self.status == MailOutcome::Success
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: MailOutcome::Error,
            message: message.into(),
            status_code: None,
            details: None,
        }
    }
}

enum Backend {
    Ready(Arc<dyn MailTransport>),
    Unconfigured(String),
}

/// Sends mail and folds every failure into a [`MailStatus`].
#[derive(Clone)]
pub struct Mailer {
    backend: Arc<Backend>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.backend.as_ref() {
            Backend::Ready(_) => "ready",
            Backend::Unconfigured(_) => "unconfigured",
        };
        f.debug_struct("Mailer").field("backend", &state).finish()
    }
}

impl Mailer {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self {
            backend: Arc::new(Backend::Ready(transport)),
        }
    }

    /// A SendGrid mailer from [`Settings`]. A missing credential does not
    /// fail here; each send reports it instead.
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.mail_config() {
            Ok(config) => Self::new(Arc::new(SendGridTransport::new(config))),
            Err(err) => {
                tracing::warn!(error = %err, "mail is not configured");
                let name = match err {
                    AgentsError::MissingCredential { name } => name,
                    _ => API_KEY_VAR.to_string(),
                };
                Self {
                    backend: Arc::new(Backend::Unconfigured(name)),
                }
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend.as_ref(), Backend::Ready(_))
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str, html: Option<&str>) -> MailStatus {
        let message = MailMessage::new(
            vec![to.to_string()],
            subject,
            text,
            html.map(str::to_string),
        );
        self.send_message(&message).await
    }

    pub async fn send_message(&self, message: &MailMessage) -> MailStatus {
        let transport = match self.backend.as_ref() {
            Backend::Ready(transport) => transport,
            Backend::Unconfigured(name) => {
                return MailStatus::error(format!("{name} not found in environment variables."))
            }
        };

        let recipients = message.to.join(", ");
        match transport.deliver(message).await {
            Ok(resp) if (200..300).contains(&resp.status) => {
                tracing::info!(to = %recipients, status = resp.status, "email sent");
                MailStatus {
                    status: MailOutcome::Success,
                    message: format!("Email sent successfully to {recipients}"),
                    status_code: Some(resp.status),
                    details: None,
                }
            }
            Ok(resp) => {
                tracing::warn!(to = %recipients, status = resp.status, "mail provider rejected message");
                let details = if resp.body.trim().is_empty() {
                    "No details".to_string()
                } else {
                    resp.body
                };
                MailStatus {
                    status: MailOutcome::Error,
                    message: "Failed to send email.".to_string(),
                    status_code: Some(resp.status),
                    details: Some(details),
                }
            }
            Err(e) => {
                tracing::warn!(to = %recipients, error = %e, "mail delivery failed");
                MailStatus::error(format!("An exception occurred: {e}"))
            }
        }
    }
}

/// Arguments of the `send_email` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SendEmailArgs {
    /// Recipient address.
    pub to_email: String,
    pub subject: String,
    pub plain_text_content: String,
    /// HTML body; the plain text is reused when omitted.
    #[serde(default)]
    pub html_content: Option<String>,
}

/// The `send_email` tool over a [`Mailer`].
pub struct SendEmailTool;

impl SendEmailTool {
    pub const NAME: &'static str = "send_email";

    #[allow(clippy::new_ret_no_self)]
    pub fn new(mailer: Mailer) -> TypedFunctionTool {
        typed_tool(
            Self::NAME,
            "Send an email with a subject and a plain text body (and optional HTML body) to one recipient.",
            move |args: SendEmailArgs| {
                let mailer = mailer.clone();
                async move {
                    Ok(mailer
                        .send(
                            &args.to_email,
                            &args.subject,
                            &args.plain_text_content,
                            args.html_content.as_deref(),
                        )
                        .await)
                }
            },
        )
    }
}

/// Answers every delivery with a fixed status and records what it was given.
#[derive(Debug, Default)]
pub struct FixedStatusTransport {
    status: u16,
    body: String,
    sent: Mutex<Vec<MailMessage>>,
}

impl FixedStatusTransport {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailTransport for FixedStatusTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<TransportResponse> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(TransportResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use pretty_assertions::assert_eq;

    struct Unreachable;

    #[async_trait]
    impl MailTransport for Unreachable {
        async fn deliver(&self, _message: &MailMessage) -> Result<TransportResponse> {
            Err(AgentsError::external("SendGrid", "connection refused"))
        }
    }

    #[tokio::test]
    async fn test_accepted_is_success() {
        let transport = Arc::new(FixedStatusTransport::new(202));
        let mailer = Mailer::new(transport.clone());
        let status = mailer.send("a@example.com", "Hi", "Hello there", None).await;

        assert!(status.is_success());
        assert_eq!(status.status_code, Some(202));
        assert_eq!(status.message, "Email sent successfully to a@example.com");
        assert_eq!(transport.sent()[0].html, "Hello there");
    }

    #[tokio::test]
    async fn test_server_error_is_error_value() {
        let transport = Arc::new(FixedStatusTransport::new(500).with_body(""));
        let status = Mailer::new(transport)
            .send("a@example.com", "Hi", "Hello", Some("<p>Hello</p>"))
            .await;

        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "status": "error",
                "message": "Failed to send email.",
                "status_code": 500,
                "details": "No details",
            })
        );
    }

    #[tokio::test]
    async fn test_transport_failure_has_no_code() {
        let status = Mailer::new(Arc::new(Unreachable))
            .send("a@example.com", "Hi", "Hello", None)
            .await;
        assert_eq!(status.status, MailOutcome::Error);
        assert_eq!(status.status_code, None);
        assert!(status.message.starts_with("An exception occurred: SendGrid failed"));
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_reports_missing_key() {
        let mailer = Mailer {
            backend: Arc::new(Backend::Unconfigured(API_KEY_VAR.into())),
        };
        assert!(!mailer.is_configured());
        let status = mailer.send("a@example.com", "Hi", "Hello", None).await;
        assert_eq!(
            status.message,
            "SENDGRID_API_KEY not found in environment variables."
        );
    }

    #[tokio::test]
    async fn test_mailer_from_settings_names_the_missing_value() {
        let settings = Settings::from_lookup(|name| match name {
            "SENDGRID_API_KEY" => Some("SG.x".to_string()),
            _ => None,
        });
        let mailer = Mailer::from_settings(&settings);
        assert!(!mailer.is_configured());
        let status = mailer.send("a@example.com", "Hi", "Hello", None).await;
        assert_eq!(
            status.message,
            "MAIL_FROM_ADDRESS not found in environment variables."
        );

        let settings = Settings::from_lookup(|name| match name {
            "SENDGRID_API_KEY" => Some("SG.x".to_string()),
            "MAIL_FROM_ADDRESS" => Some("bot@apprise.example".to_string()),
            _ => None,
        });
        assert!(Mailer::from_settings(&settings).is_configured());
    }

    #[test]
    fn test_sendgrid_body_shape() {
        let msg = MailMessage::new(
            vec!["a@example.com".into(), "b@example.com".into()],
            "Weekly sync",
            "Notes",
            Some("<b>Notes</b>".into()),
        );
        let body = msg.sendgrid_body("bot@apprise.example");
        assert_eq!(body["personalizations"][0]["to"][1]["email"], "b@example.com");
        assert_eq!(body["from"]["email"], "bot@apprise.example");
        assert_eq!(body["content"][0]["type"], "text/plain");
        assert_eq!(body["content"][1]["value"], "<b>Notes</b>");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let config = MailConfig::new("key", "bot@apprise.example").with_endpoint("http://localhost:1/");
        assert_eq!(config.endpoint, "http://localhost:1");
        assert!(!format!("{config:?}").contains("key"));
    }

    #[tokio::test]
    async fn test_send_email_tool() {
        let transport = Arc::new(FixedStatusTransport::new(202));
        let tool = SendEmailTool::new(Mailer::new(transport.clone()));
        assert_eq!(tool.name(), "send_email");

        let result = tool
            .execute(json!({
                "to_email": "a@example.com",
                "subject": "Hi",
                "plain_text_content": "Hello",
            }))
            .await
            .unwrap();
        assert_eq!(result.output["status"], "success");
        assert_eq!(result.output["status_code"], 202);

        let result = tool.execute(json!({"subject": "Hi"})).await.unwrap();
        assert!(result.is_error());
        assert!(result
            .error
            .unwrap()
            .starts_with("Malformed arguments for tool 'send_email'"));
    }
}
