use crate::config::ChannelSettings;
use crate::error::{DockcheckError, Result};
use crate::notify::{Notification, NotificationChannel};
use jiff::Timestamp;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Appends each notification as one JSON line to a local file.
pub struct FileChannel {
    path: PathBuf,
}

#[derive(Serialize)]
struct Line<'a> {
    timestamp: String,
    #[serde(flatten)]
    notification: &'a Notification,
}

impl FileChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_settings(settings: &ChannelSettings) -> Result<Self> {
        settings
            .path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Self::new)
            .ok_or_else(|| DockcheckError::NotificationChannelFailed {
                channel: "file".to_string(),
                reason: "missing 'path' in [notify.file]".to_string(),
            })
    }
}

impl NotificationChannel for FileChannel {
    fn name(&self) -> &str {
        "file"
    }

    fn send(&self, notification: &Notification) -> Result<()> {
        let line = serde_json::to_string(&Line {
            timestamp: Timestamp::now().to_string(),
            notification,
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
