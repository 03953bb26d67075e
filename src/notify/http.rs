use crate::config::ChannelSettings;
use crate::error::{DockcheckError, Result};
use crate::notify::{Notification, NotificationChannel, Priority};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::json;
use std::time::Duration;
use url::Url;

const DEFAULT_NTFY_URL: &str = "https://ntfy.sh";
const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";
const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("dockcheck/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DockcheckError::Io(std::io::Error::other(e)))
}

fn missing(channel: &str, key: &str) -> DockcheckError {
    DockcheckError::NotificationChannelFailed {
        channel: channel.to_string(),
        reason: format!("missing '{key}' in [notify.{channel}]"),
    }
}

fn required<'s>(channel: &str, key: &str, value: &'s Option<String>) -> Result<&'s str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(channel, key))
}

/// Parses an http(s) endpoint.
pub fn parse_endpoint(channel: &str, raw: &str) -> Result<Url> {
    let invalid = |reason: String| DockcheckError::NotificationChannelFailed {
        channel: channel.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(format!("invalid url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}' in '{raw}'"))),
    }
}

fn join(channel: &str, base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path).map_err(|e| DockcheckError::NotificationChannelFailed {
        channel: channel.to_string(),
        reason: e.to_string(),
    })
}

fn execute(channel: &str, request: RequestBuilder) -> Result<()> {
    let failed = |reason: String| DockcheckError::NotificationChannelFailed {
        channel: channel.to_string(),
        reason,
    };
    let response = request.send().map_err(|e| failed(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().unwrap_or_default();
    Err(failed(format!("HTTP {status}: {}", body.trim())))
}

fn headline(notification: &Notification) -> String {
    format!("{}\n{}", notification.title, notification.message)
}

/// ntfy topic publish.
pub struct NtfyChannel {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl NtfyChannel {
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        let topic = required("ntfy", "topic", &settings.topic)?;
        let base = parse_endpoint("ntfy", settings.url.as_deref().unwrap_or(DEFAULT_NTFY_URL))?;
        Ok(Self {
            client: build_client()?,
            endpoint: join("ntfy", &base, &format!("./{topic}"))?,
            token: settings.token.clone(),
        })
    }

    fn priority(priority: Priority) -> &'static str {
        match priority {
            Priority::Low => "2",
            Priority::Normal => "3",
            Priority::High => "4",
        }
    }
}

impl NotificationChannel for NtfyChannel {
    fn name(&self) -> &str {
        "ntfy"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Title", notification.title.as_str())
            .header("Priority", Self::priority(notification.priority))
            .header("Tags", "whale")
            .body(notification.message.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        execute(self.name(), request)
    }
}

/// Gotify application message.
pub struct GotifyChannel {
    client: Client,
    endpoint: Url,
    token: String,
}

impl GotifyChannel {
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        let base = parse_endpoint("gotify", required("gotify", "url", &settings.url)?)?;
        Ok(Self {
            client: build_client()?,
            endpoint: join("gotify", &base, "./message")?,
            token: required("gotify", "token", &settings.token)?.to_string(),
        })
    }
}

impl NotificationChannel for GotifyChannel {
    fn name(&self) -> &str {
        "gotify"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let priority = match notification.priority {
            Priority::Low => 2,
            Priority::Normal => 5,
            Priority::High => 8,
        };
        let request = self
            .client
            .post(self.endpoint.clone())
            .header("X-Gotify-Key", self.token.as_str())
            .json(&json!({
                "title": notification.title,
                "message": notification.message,
                "priority": priority,
            }));
        execute(self.name(), request)
    }
}

/// Discord incoming webhook.
pub struct DiscordChannel {
    client: Client,
    endpoint: Url,
}

impl DiscordChannel {
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: parse_endpoint("discord", required("discord", "url", &settings.url)?)?,
        })
    }
}

impl NotificationChannel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let content = format!("**{}**\n{}", notification.title, notification.message);
        let request = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "username": "dockcheck", "content": content }));
        execute(self.name(), request)
    }
}

/// Slack incoming webhook.
pub struct SlackChannel {
    client: Client,
    endpoint: Url,
}

impl SlackChannel {
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: parse_endpoint("slack", required("slack", "url", &settings.url)?)?,
        })
    }
}

impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "text": headline(notification) }));
        execute(self.name(), request)
    }
}

/// Telegram bot `sendMessage`.
pub struct TelegramChannel {
    client: Client,
    endpoint: Url,
    chat_id: String,
}

impl TelegramChannel {
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        let token = required("telegram", "token", &settings.token)?;
        let base = parse_endpoint(
            "telegram",
            settings.url.as_deref().unwrap_or(DEFAULT_TELEGRAM_URL),
        )?;
        Ok(Self {
            client: build_client()?,
            endpoint: join("telegram", &base, &format!("./bot{token}/sendMessage"))?,
            chat_id: required("telegram", "chat_id", &settings.chat_id)?.to_string(),
        })
    }
}

impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let request = self.client.post(self.endpoint.clone()).json(&json!({
            "chat_id": self.chat_id,
            "text": headline(notification),
            "disable_notification": notification.priority == Priority::Low,
        }));
        execute(self.name(), request)
    }
}

/// Pushover message API.
pub struct PushoverChannel {
    client: Client,
    endpoint: Url,
    token: String,
    user: String,
}

impl PushoverChannel {
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: parse_endpoint("pushover", settings.url.as_deref().unwrap_or(PUSHOVER_URL))?,
            token: required("pushover", "token", &settings.token)?.to_string(),
            user: required("pushover", "user", &settings.user)?.to_string(),
        })
    }
}

impl NotificationChannel for PushoverChannel {
    fn name(&self) -> &str {
        "pushover"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let priority = match notification.priority {
            Priority::Low => -1,
            Priority::Normal => 0,
            Priority::High => 1,
        };
        let request = self.client.post(self.endpoint.clone()).json(&json!({
            "token": self.token,
            "user": self.user,
            "title": notification.title,
            "message": notification.message,
            "priority": priority,
        }));
        execute(self.name(), request)
    }
}

/// Generic JSON POST of the whole notification.
pub struct WebhookChannel {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl WebhookChannel {
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: parse_endpoint("webhook", required("webhook", "url", &settings.url)?)?,
            token: settings.token.clone(),
        })
    }
}

impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let mut request = self.client.post(self.endpoint.clone()).json(notification);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        execute(self.name(), request)
    }
}
