use crate::config::Settings;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dockcheck",
    about = "Check running containers for newer images and optionally update them",
    version,
    author
)]
pub struct Cli {
    /// Only check containers whose names match these globs
    #[arg(value_name = "NAME")]
    pub include: Vec<String>,

    /// Exclude containers by name (glob, comma separated)
    #[arg(short, long, value_delimiter = ',', value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Only check containers carrying this label (key=value)
    #[arg(long, value_name = "KEY=VALUE")]
    pub label: Option<String>,

    /// Skip containers younger than this (N, Nd or Nw)
    #[arg(short = 'd', long, value_name = "AGE")]
    pub min_age: Option<String>,

    /// Update every container with a newer image without asking
    #[arg(short, long, conflicts_with = "notify_only")]
    pub auto: bool,

    /// Only send notifications, never update
    #[arg(short, long)]
    pub notify_only: bool,

    /// Prune dangling images after updating
    #[arg(short, long)]
    pub prune: bool,

    /// Pass --force-recreate to compose up
    #[arg(short, long)]
    pub force_recreate: bool,

    /// Only consider services of this compose manifest
    #[arg(long, value_name = "FILE")]
    pub compose_file: Option<PathBuf>,

    /// Include stopped containers
    #[arg(short = 's', long)]
    pub include_stopped: bool,

    /// Tag the current image as a backup and keep it for N days
    #[arg(short, long, value_name = "DAYS")]
    pub backup_days: Option<u32>,

    /// Registry lookup timeout in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Number of containers checked in parallel
    #[arg(short = 'x', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Run the full check but change nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Send a test notification through every configured channel
    #[arg(long, conflicts_with_all = ["list_backups", "cleanup_backups", "configure"])]
    pub test_notify: bool,

    /// List backup images
    #[arg(long, conflicts_with_all = ["cleanup_backups", "configure"])]
    pub list_backups: bool,

    /// Remove backup images older than N days
    #[arg(long, value_name = "DAYS", conflicts_with = "configure")]
    pub cleanup_backups: Option<u32>,

    /// Write a configuration template
    #[arg(long)]
    pub configure: bool,

    /// Path to the configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(short = 'm', long)]
    pub no_color: bool,
}

/// What a single invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Check,
    TestNotify,
    ListBackups,
    CleanupBackups(u32),
    Configure,
}

impl Cli {
    pub fn action(&self) -> Action {
        if self.configure {
            Action::Configure
        } else if self.test_notify {
            Action::TestNotify
        } else if self.list_backups {
            Action::ListBackups
        } else if let Some(days) = self.cleanup_backups {
            Action::CleanupBackups(days)
        } else {
            Action::Check
        }
    }

    /// Layers command-line flags over the loaded settings. Flags only ever
    /// switch things on or replace values; they never clear configured ones.
    pub fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if !self.include.is_empty() {
            settings.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            settings.exclude = self
                .exclude
                .iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(label) = &self.label {
            settings.label_filter = Some(label.clone());
        }
        if let Some(age) = &self.min_age {
            settings.min_age = Some(age.clone());
        }
        if let Some(path) = &self.compose_file {
            settings.use_compose = true;
            settings.compose_file = Some(path.clone());
        }
        if let Some(days) = self.backup_days {
            settings.backup_days = days;
        }
        if let Some(secs) = self.timeout {
            settings.registry_timeout_secs = secs;
        }
        if let Some(workers) = self.concurrency {
            settings.check_concurrency = workers;
        }

        // A flag picking a run mode replaces the configured one.
        if self.auto {
            settings.auto_update = true;
            settings.notify_only = false;
        }
        if self.notify_only {
            settings.notify_only = true;
            settings.auto_update = false;
        }
        settings.auto_prune |= self.prune;
        settings.force_recreate |= self.force_recreate;
        settings.include_stopped |= self.include_stopped;
        settings.dry_run |= self.dry_run;
        settings
    }
}
