use crate::config::NotifySettings;
use crate::error::{DockcheckError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod file;
pub mod http;
pub mod registry;

pub use registry::ChannelRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub metadata: serde_json::Value,
}

/// A single delivery target.
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Delivery result for one configured channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    pub channel: String,
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl NotificationReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Fans a notification out to every configured channel.
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
    /// Channels that could not be built, with the reason.
    broken: Vec<(String, String)>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            broken: Vec::new(),
        }
    }

    /// Builds every channel named in `settings.channels`.
    ///
    /// A channel that cannot be built is kept as a failure and reported on
    /// every send instead of aborting the run.
    pub fn from_settings(settings: &NotifySettings, registry: &ChannelRegistry) -> Self {
        let mut notifier = Self::new(Vec::new());
        for name in &settings.channels {
            let channel_settings = settings.channel_settings.get(name).cloned().unwrap_or_default();
            match registry.build(name, &channel_settings) {
                Ok(channel) => notifier.channels.push(channel),
                Err(e) => {
                    warn!(channel = %name, error = %e, "notification channel unavailable");
                    notifier.broken.push((name.clone(), e.to_string()));
                }
            }
        }
        notifier
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.broken.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len() + self.broken.len()
    }

    /// Sends to every channel. Succeeds if at least one channel delivered, or
    /// if no channel is configured at all.
    pub fn send_notifications(
        &self,
        title: &str,
        message: &str,
        priority: Priority,
        metadata: serde_json::Value,
    ) -> Result<NotificationReport> {
        let notification = Notification {
            title: title.to_string(),
            message: message.to_string(),
            priority,
            metadata,
        };

        let mut report = NotificationReport::default();
        for (channel, reason) in &self.broken {
            report.outcomes.push(ChannelOutcome {
                channel: channel.clone(),
                error: Some(reason.clone()),
            });
        }

        for channel in &self.channels {
            let error = match channel.send(&notification) {
                Ok(()) => {
                    debug!(channel = channel.name(), "notification delivered");
                    None
                }
                Err(e) => {
                    let e = DockcheckError::NotificationChannelFailed {
                        channel: channel.name().to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{e}");
                    Some(e.to_string())
                }
            };
            report.outcomes.push(ChannelOutcome {
                channel: channel.name().to_string(),
                error,
            });
        }

        if !report.outcomes.is_empty() && report.success_count() == 0 {
            return Err(DockcheckError::AllChannelsFailed(report.outcomes.len()));
        }
        if !report.outcomes.is_empty() {
            info!(
                delivered = report.success_count(),
                failed = report.failure_count(),
                "notifications sent"
            );
        }
        Ok(report)
    }
}
