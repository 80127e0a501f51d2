//! LINE Messaging API push notifier.
//!
//! Sends each event as a text push message to a single user
//! (`POST https://api.line.me/v2/bot/message/push`, bearer token auth).

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use tpwatch_feed::BoxFuture;
use tpwatch_position::{EventSink, PositionEvent, SinkError, Summary};

use crate::error::{NotifyError, NotifyResult};
use crate::message::{render_event, render_summary};

/// Push endpoint.
pub const LINE_PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";

/// Default timeout for push requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

pub struct LineNotifier {
    client: Client,
    push_url: String,
    access_token: String,
    user_id: String,
}

impl LineNotifier {
    /// Create a notifier.
    ///
    /// # Arguments
    /// * `access_token` - Channel access token
    /// * `user_id` - Recipient user id
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> NotifyResult<Self> {
        Self::with_endpoint(LINE_PUSH_URL, access_token, user_id)
    }

    /// Create a notifier posting to a custom endpoint.
    pub fn with_endpoint(
        push_url: impl Into<String>,
        access_token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> NotifyResult<Self> {
        let access_token = access_token.into();
        let user_id = user_id.into();
        if access_token.trim().is_empty() {
            return Err(NotifyError::NotConfigured("access_token"));
        }
        if user_id.trim().is_empty() {
            return Err(NotifyError::NotConfigured("user_id"));
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Http(format!("Failed to create HTTP client: {e}")))?;

        info!("LINE notifier initialized");
        Ok(Self {
            client,
            push_url: push_url.into(),
            access_token,
            user_id,
        })
    }

    /// Push a plain text message.
    pub async fn push_text(&self, text: &str) -> NotifyResult<()> {
        let body = PushRequest {
            to: &self.user_id,
            messages: [TextMessage { kind: "text", text }],
        };

        let response = self
            .client
            .post(&self.push_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(chars = text.chars().count(), "LINE message pushed");
        Ok(())
    }

    /// Push a rendered performance summary.
    pub async fn send_summary(&self, summary: &Summary) -> NotifyResult<()> {
        self.push_text(&render_summary(summary)).await
    }
}

impl EventSink for LineNotifier {
    fn name(&self) -> &str {
        "line"
    }

    fn publish<'a>(&'a self, event: &'a PositionEvent) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            self.push_text(&render_event(event))
                .await
                .map_err(|e| e.into_sink_error(self.name()))
        })
    }
}
