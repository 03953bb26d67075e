use crate::config::ChannelSettings;
use crate::error::{DockcheckError, Result};
use crate::notify::file::FileChannel;
use crate::notify::http::{
    DiscordChannel, GotifyChannel, NtfyChannel, PushoverChannel, SlackChannel, TelegramChannel,
    WebhookChannel,
};
use crate::notify::NotificationChannel;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ChannelConstructor = fn(&ChannelSettings) -> Result<Arc<dyn NotificationChannel>>;

/// Maps channel names to constructors.
pub struct ChannelRegistry {
    constructors: BTreeMap<String, ChannelConstructor>,
}

impl ChannelRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("ntfy", |s| Ok(Arc::new(NtfyChannel::from_settings(s)?)));
        registry.register("gotify", |s| Ok(Arc::new(GotifyChannel::from_settings(s)?)));
        registry.register("discord", |s| Ok(Arc::new(DiscordChannel::from_settings(s)?)));
        registry.register("slack", |s| Ok(Arc::new(SlackChannel::from_settings(s)?)));
        registry.register("telegram", |s| Ok(Arc::new(TelegramChannel::from_settings(s)?)));
        registry.register("pushover", |s| Ok(Arc::new(PushoverChannel::from_settings(s)?)));
        registry.register("webhook", |s| Ok(Arc::new(WebhookChannel::from_settings(s)?)));
        registry.register("file", |s| Ok(Arc::new(FileChannel::from_settings(s)?)));
        registry
    }

    pub fn register(&mut self, name: &str, constructor: ChannelConstructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        name: &str,
        settings: &ChannelSettings,
    ) -> Result<Arc<dyn NotificationChannel>> {
        let constructor =
            self.constructors
                .get(name)
                .ok_or_else(|| DockcheckError::NotificationChannelFailed {
                    channel: name.to_string(),
                    reason: format!(
                        "unknown channel (known: {})",
                        self.names().collect::<Vec<_>>().join(", ")
                    ),
                })?;
        constructor(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::RecordingChannel;

    #[test]
    fn builtins_are_registered() {
        let names: Vec<_> = ChannelRegistry::with_builtins().names().map(String::from).collect();
        assert_eq!(
            names,
            vec!["discord", "file", "gotify", "ntfy", "pushover", "slack", "telegram", "webhook"]
        );
    }

    #[test]
    fn unknown_channel_names_known_ones() {
        let err = ChannelRegistry::with_builtins()
            .build("fax", &ChannelSettings::default())
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("'fax'"));
        assert!(msg.contains("ntfy"));
    }

    #[test]
    fn custom_channels_register_without_dispatcher_changes() {
        let mut registry = ChannelRegistry::empty();
        registry.register("memory", |_| Ok(RecordingChannel::new("memory")));
        let channel = registry.build("memory", &ChannelSettings::default()).unwrap();
        assert_eq!(channel.name(), "memory");
    }
}
