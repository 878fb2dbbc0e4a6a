use common_observability::LinkMetrics;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{templates, CliqChannel, CliqMessage};
use crate::config::CliqConfig;

const POST_TIMEOUT: Duration = Duration::from_secs(5);
const THREAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("chat notifications are disabled")]
    Disabled,
    #[error("chat bot is not configured: {0} missing")]
    NotConfigured(&'static str),
    #[error("channel {0} has no unique name configured")]
    UnknownChannel(String),
    #[error("chat webhook returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("chat response carried no message_id")]
    MissingMessageId,
    #[error("chat transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Where a message goes: a configured channel, or a raw channel unique name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTarget {
    Channel(CliqChannel),
    Custom(String),
}

impl ChannelTarget {
    fn label(&self) -> &str {
        match self {
            ChannelTarget::Channel(c) => c.as_str(),
            ChannelTarget::Custom(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThreadSeed {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ThreadPost {
    pub message_id: String,
    pub thread_created: bool,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    data: Option<PostResponseData>,
}

#[derive(Debug, Deserialize)]
struct PostResponseData {
    #[serde(default)]
    message_id: Option<String>,
}

pub struct CliqClient {
    http: Client,
    config: CliqConfig,
    metrics: LinkMetrics,
}

impl CliqClient {
    pub fn new(http: Client, config: CliqConfig, metrics: LinkMetrics) -> Self {
        Self { http, config, metrics }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Channel webhook URL with bot name and token as query parameters.
    pub fn webhook_url(&self, target: &ChannelTarget) -> Result<Url, NotifyError> {
        if !self.config.enabled {
            return Err(NotifyError::Disabled);
        }
        let bot = self
            .config
            .bot_unique_name
            .as_deref()
            .ok_or(NotifyError::NotConfigured("bot unique name"))?;
        let token = self
            .config
            .bot_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .ok_or(NotifyError::NotConfigured("bot token"))?;
        let channel = match target {
            ChannelTarget::Channel(c) => self
                .config
                .channels
                .get(c)
                .map(String::as_str)
                .ok_or_else(|| NotifyError::UnknownChannel(c.as_str().to_string()))?,
            ChannelTarget::Custom(name) if !name.trim().is_empty() => name.trim(),
            ChannelTarget::Custom(_) => return Err(NotifyError::UnknownChannel(String::new())),
        };
        let base = format!("{}/api/v2/channelsbyname/{}/message", self.config.base_url, channel);
        Url::parse_with_params(&base, &[("bot_unique_name", bot), ("zapikey", token.expose())])
            .map_err(|_| NotifyError::UnknownChannel(channel.to_string()))
    }

    /// Posts to a configured channel. Does nothing while notifications are disabled.
    pub async fn post(&self, channel: CliqChannel, message: &CliqMessage) -> Result<(), NotifyError> {
        self.post_to(&ChannelTarget::Channel(channel), message).await
    }

    pub async fn post_to(&self, target: &ChannelTarget, message: &CliqMessage) -> Result<(), NotifyError> {
        if !self.config.enabled {
            debug!(channel = target.label(), "chat notifications disabled; skipping");
            return Ok(());
        }
        let url = self.webhook_url(target)?;
        let result = self.http.post(url).json(message).timeout(POST_TIMEOUT).send().await;
        let response = match result {
            Ok(r) => r,
            Err(err) => {
                self.record(target, "transport_error");
                warn!(channel = target.label(), error = %err, "chat webhook request failed");
                return Err(err.into());
            }
        };
        let status = response.status();
        if !matches!(status, StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT) {
            let body: String = response.text().await.unwrap_or_default().chars().take(100).collect();
            self.record(target, "rejected");
            warn!(channel = target.label(), status = status.as_u16(), body = %body, "chat webhook returned failure status");
            return Err(NotifyError::Status { status: status.as_u16(), body });
        }
        self.record(target, "ok");
        info!(channel = target.label(), "chat notification delivered");
        Ok(())
    }

    /// Posts `main`, then (optionally) opens a thread under it. A failed
    /// thread post is logged and does not fail the call.
    pub async fn send_with_thread(
        &self,
        target: &ChannelTarget,
        main: &CliqMessage,
        thread: Option<ThreadSeed>,
    ) -> Result<ThreadPost, NotifyError> {
        let url = self.webhook_url(target)?;
        let response = self
            .http
            .post(url.clone())
            .json(main)
            .timeout(THREAD_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !matches!(status, StatusCode::OK | StatusCode::CREATED) {
            let body: String = response.text().await.unwrap_or_default().chars().take(100).collect();
            self.record(target, "rejected");
            warn!(channel = target.label(), status = status.as_u16(), "chat main message failed");
            return Err(NotifyError::Status { status: status.as_u16(), body });
        }
        let parsed: PostResponse = response.json().await.map_err(|_| NotifyError::MissingMessageId)?;
        let message_id = parsed
            .message_id
            .or_else(|| parsed.data.and_then(|d| d.message_id))
            .ok_or(NotifyError::MissingMessageId)?;
        self.record(target, "ok");

        let mut thread_created = false;
        if let Some(seed) = thread {
            let payload = templates::thread_message(&message_id, &seed.title, &seed.message);
            match self.http.post(url).json(&payload).timeout(THREAD_TIMEOUT).send().await {
                Ok(resp) if matches!(resp.status(), StatusCode::OK | StatusCode::CREATED) => {
                    thread_created = true;
                }
                Ok(resp) => {
                    warn!(channel = target.label(), status = resp.status().as_u16(), message_id = %message_id, "chat thread creation failed");
                }
                Err(err) => {
                    warn!(channel = target.label(), error = %err, message_id = %message_id, "chat thread request failed");
                }
            }
        }
        Ok(ThreadPost { message_id, thread_created })
    }

    fn record(&self, target: &ChannelTarget, outcome: &str) {
        let label = match target {
            ChannelTarget::Channel(c) => c.as_str(),
            ChannelTarget::Custom(_) => "custom",
        };
        self.metrics.notifications_total.with_label_values(&[label, outcome]).inc();
    }
}
