//! Backup tags of images that are about to be replaced.
//!
//! Before an update the running image is tagged as
//! `dockcheck/<container>:<YYYY-MM-DD_HHMM>_<original tag>`, which keeps the
//! old layers alive after the pull. A retention sweep removes tags older than
//! the configured number of days.

use crate::error::{DockcheckError, Result};
use crate::registry::ImageReference;
use crate::runtime::{ContainerRecord, ContainerRuntime};
use jiff::civil::DateTime;
use jiff::{Span, Zoned};
use std::fmt;
use tracing::{info, warn};

pub const BACKUP_NAMESPACE: &str = "dockcheck/";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M";
const TIMESTAMP_LEN: usize = "YYYY-MM-DD_HHMM".len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupImageTag {
    /// Container name as used in the repository (lowercased, repositories can't hold capitals).
    pub container_name: String,
    pub timestamp: DateTime,
    pub original_tag: String,
}

impl BackupImageTag {
    pub fn new(container_name: &str, original_tag: &str, at: DateTime) -> Self {
        Self {
            container_name: container_name.to_ascii_lowercase(),
            timestamp: at
                .with()
                .second(0)
                .subsec_nanosecond(0)
                .build()
                .unwrap_or(at),
            original_tag: original_tag.to_string(),
        }
    }

    pub fn repository(&self) -> String {
        format!("{BACKUP_NAMESPACE}{}", self.container_name)
    }

    pub fn tag(&self) -> String {
        format!(
            "{}_{}",
            self.timestamp.strftime(TIMESTAMP_FORMAT),
            self.original_tag
        )
    }

    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository(), self.tag())
    }

    /// Parses a `dockcheck/<name>` repository and its `<timestamp>_<tag>` tag.
    pub fn parse(repository: &str, tag: &str) -> Option<Self> {
        let container_name = repository.strip_prefix(BACKUP_NAMESPACE)?;
        if container_name.is_empty()
            || tag.len() <= TIMESTAMP_LEN + 1
            || !tag.is_char_boundary(TIMESTAMP_LEN)
        {
            return None;
        }
        let (stamp, rest) = tag.split_at(TIMESTAMP_LEN);
        let original_tag = rest.strip_prefix('_')?;
        if original_tag.is_empty() {
            return None;
        }

        Some(Self {
            container_name: container_name.to_string(),
            timestamp: parse_timestamp(stamp)?,
            original_tag: original_tag.to_string(),
        })
    }

    pub fn is_older_than(&self, cutoff: DateTime) -> bool {
        self.timestamp < cutoff
    }
}

impl fmt::Display for BackupImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

/// `YYYY-MM-DD_HHMM` without going through a format parser: every field is fixed width.
fn parse_timestamp(stamp: &str) -> Option<DateTime> {
    let bytes = stamp.as_bytes();
    if bytes.len() != TIMESTAMP_LEN || bytes[4] != b'-' || bytes[7] != b'-' || bytes[10] != b'_' {
        return None;
    }
    let num = |range: std::ops::Range<usize>| -> Option<i16> {
        let part = stamp.get(range)?;
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };
    let year = num(0..4)?;
    let month = i8::try_from(num(5..7)?).ok()?;
    let day = i8::try_from(num(8..10)?).ok()?;
    let hour = i8::try_from(num(11..13)?).ok()?;
    let minute = i8::try_from(num(13..15)?).ok()?;
    DateTime::new(year, month, day, hour, minute, 0, 0).ok()
}

/// A backup image present in the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub tag: BackupImageTag,
    pub image_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub kept: usize,
    pub failed: Vec<(String, String)>,
}

/// BackupManager creates, lists and expires backup tags through the runtime.
pub struct BackupManager<'a> {
    runtime: &'a dyn ContainerRuntime,
    dry_run: bool,
}

impl<'a> BackupManager<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, dry_run: bool) -> Self {
        Self { runtime, dry_run }
    }

    /// Tags the container's current image; in dry-run only reports the tag it would create.
    pub fn create(&self, container: &ContainerRecord, now: &Zoned) -> Result<BackupImageTag> {
        let original_tag = ImageReference::parse(&container.image_reference)
            .map(|r| r.tag)
            .unwrap_or_else(|_| "latest".to_string());
        let backup = BackupImageTag::new(&container.name, &original_tag, now.datetime());

        if self.dry_run {
            info!(container = %container.name, backup = %backup, "dry run: would tag backup");
            return Ok(backup);
        }

        self.runtime
            .tag_image(&container.image_id, &backup.reference())
            .map_err(|e| DockcheckError::BackupFailed {
                container: container.name.clone(),
                reason: e.to_string(),
            })?;
        info!(container = %container.name, backup = %backup, "created backup tag");
        Ok(backup)
    }

    /// All parsable backups, oldest first.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        let mut entries: Vec<BackupEntry> = self
            .runtime
            .list_images(BACKUP_NAMESPACE)?
            .into_iter()
            .filter_map(|image| {
                BackupImageTag::parse(&image.repository, &image.tag).map(|tag| BackupEntry {
                    tag,
                    image_id: image.id,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.tag.timestamp.cmp(&b.tag.timestamp));
        Ok(entries)
    }

    /// Removes backups older than `days` days. Removal failures are collected, not fatal.
    pub fn cleanup(&self, days: u32, now: &Zoned) -> Result<CleanupReport> {
        let cutoff = now
            .datetime()
            .checked_sub(Span::new().days(i64::from(days)))
            .map_err(|e| DockcheckError::Config(format!("invalid retention of {days} days: {e}")))?;

        let mut report = CleanupReport::default();
        for entry in self.list()? {
            if !entry.tag.is_older_than(cutoff) {
                report.kept += 1;
                continue;
            }
            let reference = entry.tag.reference();
            if self.dry_run {
                info!(backup = %reference, "dry run: would remove backup");
                report.removed.push(reference);
                continue;
            }
            match self.runtime.remove_image(&reference) {
                Ok(()) => {
                    info!(backup = %reference, "removed expired backup");
                    report.removed.push(reference);
                }
                Err(e) => {
                    warn!(backup = %reference, error = %e, "failed to remove backup");
                    report.failed.push((reference, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}
