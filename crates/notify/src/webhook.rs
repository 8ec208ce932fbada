//! HTTP webhook channel.
//!
//! Each notification is POSTed either as a JSON envelope or, when a body
//! template is configured, as the rendered template.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::templating::TemplateRenderer;
use crate::traits::{Notification, Notifier, NotifyError};

/// Event name carried in the default JSON envelope.
pub const EVENT_NAME: &str = "compliance.notification";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for a [`WebhookNotifier`].
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub bearer_token: Option<String>,
    /// Minijinja template for the request body.
    pub body_template: Option<String>,
    pub timeout: Duration,
}

impl WebhookSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            body_template: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_template(mut self, template: Option<String>) -> Self {
        self.body_template = template;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    event: &'static str,
    sent_at: String,
    notification: &'a Notification,
}

/// Delivers notifications to one HTTP endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: reqwest::Url,
    bearer_token: Option<String>,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    /// Shared client (connection pooling, request timeout).
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Validate settings and build the channel.
    ///
    /// The URL must be absolute http(s) and the body template, if any, must
    /// parse. Both failures are [`NotifyError::Config`].
    pub fn new(settings: WebhookSettings, renderer: Arc<TemplateRenderer>) -> Result<Self, NotifyError> {
        let url = reqwest::Url::parse(&settings.url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url '{}': {e}", settings.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NotifyError::Config(format!(
                "unsupported webhook scheme: {}",
                url.scheme()
            )));
        }

        if let Some(tmpl) = &settings.body_template {
            renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            url,
            bearer_token: settings.bearer_token,
            body_template: settings.body_template,
            renderer,
            client,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    fn body_for(&self, notification: &Notification) -> Result<String, NotifyError> {
        let now = chrono::Utc::now().to_rfc3339();
        match &self.body_template {
            Some(tmpl) => self.renderer.render(tmpl, notification, &now),
            None => serde_json::to_string(&Envelope {
                event: EVENT_NAME,
                sent_at: now,
                notification,
            })
            .map_err(|e| NotifyError::Config(format!("failed to serialize notification: {e}"))),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = self.body_for(notification)?;

        let mut request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(url = %self.url, %status, "webhook rejected notification");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(url = %self.url, %status, "webhook notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
