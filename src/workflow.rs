use crate::agents::backup::BackupManager;
use crate::agents::checker::{CheckReport, UpdateChecker};
use crate::agents::discovery::ContainerDiscovery;
use crate::agents::filter::{FilterChain, FilterSpec};
use crate::agents::update::{
    OrchestratorOptions, UpdateCandidate, UpdateInteraction, UpdateOrchestrator, UpdateReport,
};
use crate::cancel::CancellationToken;
use crate::config::{Settings, CONFIG_FILE_NAME};
use crate::error::{DockcheckError, Result};
use crate::notify::{ChannelRegistry, Notifier, Priority};
use crate::registry::{RegistryFactory, RegistryResolver};
use crate::runtime::{ComposeControl, ContainerRuntime, DockerCli};
use colored::Colorize;
use jiff::Zoned;
use serde_json::json;
use std::fmt;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How the candidates of a cycle are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    NotifyOnly,
    Auto,
    Interactive,
}

impl RunMode {
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.dry_run {
            RunMode::DryRun
        } else if settings.notify_only {
            RunMode::NotifyOnly
        } else if settings.auto_update {
            RunMode::Auto
        } else {
            RunMode::Interactive
        }
    }

    /// False in interactive mode, where the selection prompt owns the terminal.
    pub fn shows_progress(self) -> bool {
        self != RunMode::Interactive
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunMode::DryRun => "dry-run",
            RunMode::NotifyOnly => "notify-only",
            RunMode::Auto => "auto",
            RunMode::Interactive => "interactive",
        };
        f.write_str(label)
    }
}

/// Everything a cycle talks to besides its settings.
pub struct Collaborators<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub compose: &'a dyn ComposeControl,
    pub registry: &'a RegistryResolver,
    pub notifier: &'a Notifier,
    /// Answers for the interactive prompt.
    pub input: Box<dyn BufRead + 'a>,
    pub show_progress: bool,
}

/// Aggregate outcome of one cycle.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub mode: RunMode,
    pub discovered: usize,
    pub checked: usize,
    pub filtered: usize,
    pub errors: usize,
    pub up_to_date: usize,
    pub candidates: Vec<String>,
    pub updates: Option<UpdateReport>,
    /// Some notification of this cycle reached no channel at all.
    pub notification_failed: bool,
    pub backups_removed: usize,
    pub cancelled: bool,
}

impl CycleSummary {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            discovered: 0,
            checked: 0,
            filtered: 0,
            errors: 0,
            up_to_date: 0,
            candidates: Vec::new(),
            updates: None,
            notification_failed: false,
            backups_removed: 0,
            cancelled: false,
        }
    }

    fn absorb(&mut self, report: &CheckReport) {
        self.checked = report.checked;
        self.filtered = report.filtered.len();
        self.errors = report.errors.len();
        self.up_to_date = report.up_to_date.len();
        self.candidates = report.candidate_names().into_iter().map(String::from).collect();
        self.cancelled |= report.cancelled;
    }

    /// 0 for a completed cycle regardless of per-container failures, 130 when interrupted.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled { 130 } else { 0 }
    }
}

/// Runs one check cycle with the real docker CLI, registry tools and channels.
pub fn execute_check(settings: &Settings, cancel: &CancellationToken) -> Result<CycleSummary> {
    let docker = DockerCli::new(settings.docker_bin.clone());
    let registry = RegistryFactory::create_resolver(settings);
    let notifier = Notifier::from_settings(&settings.notify, &ChannelRegistry::with_builtins());

    let mut collaborators = Collaborators {
        runtime: &docker,
        compose: &docker,
        registry: &registry,
        notifier: &notifier,
        input: Box::new(io::stdin().lock()),
        show_progress: RunMode::from_settings(settings).shows_progress(),
    };
    run_cycle(settings, &mut collaborators, cancel)
}

/// One full cycle: discover, check, report, notify, apply, notify, sweep backups.
///
/// Only an unreachable runtime (or a bad compose manifest) ends in `Err`;
/// everything else is recorded in the summary.
pub fn run_cycle(
    settings: &Settings,
    collab: &mut Collaborators<'_>,
    cancel: &CancellationToken,
) -> Result<CycleSummary> {
    let mode = RunMode::from_settings(settings);
    let mut summary = CycleSummary::new(mode);
    info!(%mode, "starting check cycle");

    if settings.dry_run {
        println!("{}", "Checking for container updates (dry run)...".cyan().bold());
    } else {
        println!("{}", "Checking for container updates...".cyan().bold());
    }

    check_and_apply(settings, collab, cancel, &mut summary)?;

    // Retention sweep of backup tags, whatever the cycle found
    if !settings.dry_run && settings.backup_days > 0 && !summary.cancelled {
        println!("\n{}", "Removing expired backups...".yellow());
        summary.backups_removed = sweep_backups(collab.runtime, settings.backup_days);
    }

    Ok(summary)
}

fn check_and_apply(
    settings: &Settings,
    collab: &mut Collaborators<'_>,
    cancel: &CancellationToken,
    summary: &mut CycleSummary,
) -> Result<()> {
    let mode = summary.mode;

    // Step 1: Discover
    println!("\n{}", "1. Discovering containers...".yellow());
    let ids = ContainerDiscovery::new(collab.runtime, settings).discover()?;
    summary.discovered = ids.len();
    if ids.is_empty() {
        println!("{}", "✓ No containers found, nothing to do".green());
        return Ok(());
    }
    println!("{}", format!("✓ Found {} container(s)", ids.len()).green());

    if !settings.check {
        println!("{}", "Update checks are disabled (check = false)".dimmed());
        return Ok(());
    }
    if cancel.is_cancelled() {
        summary.cancelled = true;
        return Ok(());
    }

    // Step 2: Filter and compare digests
    println!("\n{}", "2. Checking for newer images...".yellow());
    let filters = FilterChain::new(FilterSpec::from_settings(settings));
    let report = UpdateChecker::new(collab.runtime, collab.registry, &filters)
        .with_concurrency(settings.check_concurrency)
        .with_progress(collab.show_progress)
        .check_all(&ids, cancel)?;
    summary.absorb(&report);
    println!("{}", "✓ Check completed".green());

    // Step 3: Report
    print_check_report(&report);
    if summary.cancelled {
        println!("\n{}", "Interrupted, skipping updates.".yellow());
        return Ok(());
    }

    // Step 4: Notify about what was found
    println!("\n{}", "3. Sending notifications...".yellow());
    notify_check_result(collab.notifier, settings, &report, mode, summary);

    if report.candidates.is_empty() {
        println!("\n{}", "✨ All containers are up to date!".green().bold());
        return Ok(());
    }

    // Step 5: Apply according to the run mode
    let selected = match mode {
        RunMode::NotifyOnly => {
            println!("\n{}", "4. Notify-only mode, leaving containers untouched".yellow());
            return Ok(());
        }
        RunMode::DryRun | RunMode::Auto => report.candidates.clone(),
        RunMode::Interactive => {
            println!("\n{}", "4. Choose containers to update".yellow());
            UpdateInteraction::new(&mut collab.input).select(&report.candidates)?
        }
    };

    if selected.is_empty() {
        println!("\n{}", "No updates were selected".yellow());
        return Ok(());
    }
    if cancel.is_cancelled() {
        summary.cancelled = true;
        return Ok(());
    }

    println!("\n{}", format!("5. Updating {} container(s)...", selected.len()).yellow());
    let orchestrator = UpdateOrchestrator::new(
        collab.runtime,
        collab.compose,
        OrchestratorOptions::from_settings(settings),
    );
    let updates = orchestrator.apply(&selected, cancel);
    summary.cancelled |= updates.cancelled;

    print_update_report(&updates);
    notify_completion(collab.notifier, &updates, mode, summary);

    summary.updates = Some(updates);
    println!("\n{}", "✨ Update cycle completed!".green().bold());
    Ok(())
}

fn notify_check_result(
    notifier: &Notifier,
    settings: &Settings,
    report: &CheckReport,
    mode: RunMode,
    summary: &mut CycleSummary,
) {
    if notifier.is_empty() {
        println!("{}", "   No notification channels configured".dimmed());
        return;
    }

    let metadata = json!({
        "mode": mode.to_string(),
        "checked": report.checked,
        "filtered": report.filtered.len(),
        "errors": report.errors.iter().map(|(name, _)| name).collect::<Vec<_>>(),
        "candidates": report.candidate_names(),
    });

    debug!(channels = notifier.channel_count(), "notifying");
    let sent = if report.candidates.is_empty() {
        if !settings.notify.on_no_updates {
            println!("{}", "   Nothing to report".dimmed());
            return;
        }
        notifier.send_notifications(
            "dockcheck: no updates",
            &format!("All {} checked container(s) are up to date.", report.checked),
            Priority::Low,
            metadata,
        )
    } else {
        let names = report.candidate_names();
        notifier.send_notifications(
            &format!("dockcheck: {} update(s) available", names.len()),
            &format!("Updates available for:\n{}", names.join("\n")),
            Priority::Normal,
            metadata,
        )
    };
    record_delivery(sent, summary);
}

fn notify_completion(
    notifier: &Notifier,
    updates: &UpdateReport,
    mode: RunMode,
    summary: &mut CycleSummary,
) {
    if notifier.is_empty() || updates.is_empty() {
        return;
    }

    let mut lines: Vec<String> = updates
        .succeeded()
        .map(|r| format!("✓ {}", r.container_name))
        .collect();
    lines.extend(updates.failed().map(|r| {
        format!("✗ {}: {}", r.container_name, r.message.as_deref().unwrap_or("failed"))
    }));

    let verb = if mode == RunMode::DryRun { "would update" } else { "updated" };
    let title = format!(
        "dockcheck: {} {}, {} failed",
        verb,
        updates.success_count(),
        updates.failure_count()
    );
    let priority = if updates.failure_count() > 0 {
        Priority::High
    } else {
        Priority::Normal
    };
    let metadata = json!({
        "mode": mode.to_string(),
        "succeeded": updates.succeeded().map(|r| &r.container_name).collect::<Vec<_>>(),
        "failed": updates.failed().map(|r| &r.container_name).collect::<Vec<_>>(),
        "pruned": updates.pruned,
    });

    let sent = notifier.send_notifications(&title, &lines.join("\n"), priority, metadata);
    record_delivery(sent, summary);
}

fn record_delivery(sent: Result<crate::notify::NotificationReport>, summary: &mut CycleSummary) {
    match sent {
        Ok(report) => println!(
            "{}",
            format!("✓ Notified {} channel(s)", report.success_count()).green()
        ),
        Err(e) => {
            warn!(error = %e, "notification failed");
            println!("{}", format!("⚠ {e}").red());
            summary.notification_failed = true;
        }
    }
}

fn sweep_backups(runtime: &dyn ContainerRuntime, days: u32) -> usize {
    match BackupManager::new(runtime, false).cleanup(days, &Zoned::now()) {
        Ok(report) => {
            let line = format!(
                "✓ Removed {} expired backup(s), kept {}",
                report.removed.len(),
                report.kept
            );
            println!("{}", line.green());
            report.removed.len()
        }
        Err(e) => {
            warn!(error = %e, "backup retention sweep failed");
            0
        }
    }
}

fn print_check_report(report: &CheckReport) {
    if !report.up_to_date.is_empty() {
        println!("\n{}:", "Containers on latest version".green().bold());
        for name in &report.up_to_date {
            println!("  • {}", name);
        }
    }

    if !report.errors.is_empty() {
        println!("\n{}:", "Containers with errors, won't get updated".red().bold());
        for (name, reason) in &report.errors {
            println!("  • {} {}", name.white().bold(), reason.dimmed());
        }
    }

    if !report.filtered.is_empty() {
        println!("\n{}:", "Skipped by filters".dimmed());
        for (name, reason) in &report.filtered {
            println!("  • {} ({})", name, reason.to_string().dimmed());
        }
    }

    if !report.candidates.is_empty() {
        println!("\n{}:", "Containers with updates available".cyan().bold());
        for candidate in &report.candidates {
            print_candidate(candidate);
        }
    }
}

fn print_candidate(candidate: &UpdateCandidate) {
    let kind = if candidate.container.is_compose_managed() {
        "compose".green()
    } else {
        "standalone".yellow()
    };
    println!(
        "  • {} {} ({})",
        candidate.name().white().bold(),
        candidate.container.image_reference.dimmed(),
        kind
    );
}

fn print_update_report(report: &UpdateReport) {
    println!("\n{}", "📦 Update Summary:".cyan().bold());
    println!(
        "   {} succeeded, {} failed",
        report.success_count().to_string().green(),
        report.failure_count().to_string().red()
    );
    if report.pruned {
        println!("   {}", "dangling images pruned".dimmed());
    }
    if report.cancelled {
        println!("   {}", "interrupted before all containers were processed".yellow());
    }
}

/// Sends a test message through every configured channel.
pub fn execute_test_notify(settings: &Settings) -> Result<()> {
    println!("{}", "Sending test notification...".cyan().bold());
    let notifier = Notifier::from_settings(&settings.notify, &ChannelRegistry::with_builtins());
    test_notify(&notifier)
}

fn test_notify(notifier: &Notifier) -> Result<()> {
    if notifier.is_empty() {
        return Err(DockcheckError::Config(
            "no notification channels configured (notify.channels)".to_string(),
        ));
    }

    let outcome = notifier.send_notifications(
        "dockcheck: test notification",
        "Notifications from dockcheck are working.",
        Priority::Low,
        json!({ "test": true }),
    );
    match outcome {
        Ok(report) => {
            for channel in &report.outcomes {
                match &channel.error {
                    None => println!("{}", format!("✓ {}", channel.channel).green()),
                    Some(reason) => {
                        println!("{} {}", format!("✗ {}", channel.channel).red(), reason.dimmed())
                    }
                }
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Lists every backup tag under the backup namespace, oldest first.
pub fn execute_list_backups(settings: &Settings) -> Result<()> {
    let docker = DockerCli::new(settings.docker_bin.clone());
    list_backups(&docker)
}

fn list_backups(runtime: &dyn ContainerRuntime) -> Result<()> {
    let backups = BackupManager::new(runtime, false).list()?;
    if backups.is_empty() {
        println!("{}", "No backups found".yellow());
        return Ok(());
    }

    println!("{}", format!("📦 {} backup(s):", backups.len()).cyan().bold());
    for entry in &backups {
        println!(
            "  • {} {} {}",
            entry.tag.container_name.white().bold(),
            entry.tag.reference(),
            entry.image_id.dimmed()
        );
    }
    Ok(())
}

/// Removes backups older than `days` days.
pub fn execute_cleanup_backups(settings: &Settings, days: u32) -> Result<()> {
    let docker = DockerCli::new(settings.docker_bin.clone());
    cleanup_backups(&docker, days, settings.dry_run)
}

fn cleanup_backups(runtime: &dyn ContainerRuntime, days: u32, dry_run: bool) -> Result<()> {
    println!(
        "{}",
        format!("Removing backups older than {days} day(s)...").cyan().bold()
    );
    let report = BackupManager::new(runtime, dry_run).cleanup(days, &Zoned::now())?;

    let verb = if dry_run { "Would remove" } else { "Removed" };
    for reference in &report.removed {
        println!("  • {} {}", verb.dimmed(), reference);
    }
    for (reference, reason) in &report.failed {
        println!("  • {} {} {}", "Failed".red(), reference, reason.dimmed());
    }
    println!(
        "{}",
        format!("✓ {} {} backup(s), kept {}", verb, report.removed.len(), report.kept).green()
    );
    Ok(())
}

/// Writes a starter config file and returns where it went.
pub fn execute_configure(explicit: Option<&Path>) -> Result<PathBuf> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => Settings::user_config_path().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
    };
    Settings::write_template(&path)?;
    println!(
        "{}",
        format!("✓ Wrote configuration template to {}", path.display()).green()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::update::context::UpdateState;
    use crate::notify::tests::RecordingChannel;
    use crate::registry::tests::ScriptedSource;
    use crate::runtime::fake::{compose_container, container, FakeRuntime};
    use crate::runtime::{ContainerRecord, LocalImage};
    use std::fs;
    use std::io::Cursor;
    use std::time::Duration;

    const OLD: &str = "sha256:AAA";
    const NEW: &str = "sha256:BBB";

    struct Fixture {
        _dir: tempfile::TempDir,
        manifest: String,
        runtime: FakeRuntime,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("compose.yaml");
            fs::write(&path, "services: {}\n").unwrap();
            let manifest = path.canonicalize().unwrap().to_string_lossy().into_owned();
            Self {
                _dir: dir,
                manifest,
                runtime: FakeRuntime::default(),
            }
        }

        fn add(&mut self, container: ContainerRecord, digest: &str) {
            self.runtime.repo_digests.insert(
                container.image_id.clone(),
                vec![format!("docker.io/acme/app@{digest}")],
            );
            self.runtime.containers.push(container);
        }

        fn add_service(&mut self, name: &str, digest: &str) {
            let c = compose_container(name, "acme/app:1.0", &self.manifest);
            self.add(c, digest);
        }

        fn run(
            &self,
            settings: &Settings,
            notifier: &Notifier,
            answers: &str,
        ) -> Result<CycleSummary> {
            let registry = RegistryResolver::new(
                vec![ScriptedSource::ok("scripted", NEW)],
                Duration::from_secs(1),
            );
            let mut collab = Collaborators {
                runtime: &self.runtime,
                compose: &self.runtime,
                registry: &registry,
                notifier,
                input: Box::new(Cursor::new(answers.to_string())),
                show_progress: false,
            };
            run_cycle(settings, &mut collab, &CancellationToken::new())
        }
    }

    fn auto() -> Settings {
        Settings {
            auto_update: true,
            ..Default::default()
        }
    }

    fn silent() -> Notifier {
        Notifier::new(Vec::new())
    }

    #[test]
    fn matching_digest_means_up_to_date() {
        let mut fx = Fixture::new();
        fx.add_service("web", NEW);
        let summary = fx.run(&auto(), &silent(), "").unwrap();

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.up_to_date, 1);
        assert!(summary.candidates.is_empty());
        assert!(summary.updates.is_none());
        assert!(fx.runtime.mutations().is_empty());
    }

    #[test]
    fn differing_digest_is_updated_in_auto_mode() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let summary = fx.run(&auto(), &silent(), "").unwrap();

        assert_eq!(summary.candidates, vec!["web"]);
        let updates = summary.updates.as_ref().unwrap();
        assert_eq!(updates.success_count(), 1);
        assert_eq!(updates.results[0].final_state, UpdateState::Done);
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(
            fx.runtime.mutations(),
            vec![
                format!("compose pull {} web", fx.manifest),
                format!("compose up {} web force=false", fx.manifest),
            ]
        );
    }

    #[test]
    fn exclude_wins_over_include() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        fx.add_service("db", OLD);
        let settings = Settings {
            include: vec!["web".into(), "db".into()],
            exclude: vec!["web".into()],
            ..auto()
        };
        let summary = fx.run(&settings, &silent(), "").unwrap();

        assert_eq!(summary.filtered, 1);
        assert_eq!(summary.candidates, vec!["db"]);
    }

    #[test]
    fn young_containers_are_never_checked() {
        let mut fx = Fixture::new();
        fx.add(container("fresh", "acme/app", 3), OLD);
        let settings = Settings {
            min_age: Some("7d".into()),
            ..auto()
        };
        let summary = fx.run(&settings, &silent(), "").unwrap();

        assert_eq!(summary.filtered, 1);
        assert_eq!(summary.checked, 0);
        assert!(fx.runtime.mutations().is_empty());
    }

    #[test]
    fn dry_run_reports_would_update_without_mutations() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let settings = Settings {
            dry_run: true,
            backup_days: 7,
            auto_prune: true,
            ..Default::default()
        };
        let summary = fx.run(&settings, &silent(), "").unwrap();

        assert_eq!(summary.mode, RunMode::DryRun);
        let updates = summary.updates.as_ref().unwrap();
        assert_eq!(updates.success_count(), 1);
        assert!(updates.results[0].dry_run);
        assert!(fx.runtime.mutations().is_empty());
    }

    #[test]
    fn failing_channels_do_not_fail_the_cycle() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let notifier = Notifier::new(vec![
            RecordingChannel::failing("ntfy"),
            RecordingChannel::failing("gotify"),
        ]);
        let summary = fx.run(&auto(), &notifier, "").unwrap();

        assert!(summary.notification_failed);
        assert_eq!(summary.updates.as_ref().unwrap().success_count(), 1);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn notifications_for_found_and_completed_updates() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let channel = RecordingChannel::new("memory");
        let notifier = Notifier::new(vec![channel.clone()]);
        fx.run(&auto(), &notifier, "").unwrap();

        assert_eq!(
            channel.titles(),
            vec!["dockcheck: 1 update(s) available", "dockcheck: updated 1, 0 failed"]
        );
        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent[0].metadata["candidates"][0], "web");
    }

    #[test]
    fn no_update_notification_is_opt_in() {
        let mut fx = Fixture::new();
        fx.add_service("web", NEW);
        let channel = RecordingChannel::new("memory");
        let notifier = Notifier::new(vec![channel.clone()]);

        fx.run(&auto(), &notifier, "").unwrap();
        assert!(channel.titles().is_empty());

        let mut settings = auto();
        settings.notify.on_no_updates = true;
        fx.run(&settings, &notifier, "").unwrap();
        assert_eq!(channel.titles(), vec!["dockcheck: no updates"]);
    }

    #[test]
    fn notify_only_never_mutates() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let channel = RecordingChannel::new("memory");
        let notifier = Notifier::new(vec![channel.clone()]);
        let settings = Settings {
            notify_only: true,
            ..Default::default()
        };
        let summary = fx.run(&settings, &notifier, "").unwrap();

        assert_eq!(summary.mode, RunMode::NotifyOnly);
        assert!(summary.updates.is_none());
        assert_eq!(channel.titles().len(), 1);
        assert!(fx.runtime.mutations().is_empty());
    }

    #[test]
    fn interactive_mode_applies_only_selected() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        fx.add_service("db", OLD);
        let summary = fx.run(&Settings::default(), &silent(), "n\ny\n").unwrap();

        assert_eq!(summary.mode, RunMode::Interactive);
        let updates = summary.updates.as_ref().unwrap();
        assert_eq!(updates.results.len(), 1);
        assert_eq!(updates.results[0].container_name, "db");
    }

    #[test]
    fn interactive_quit_before_selection_updates_nothing() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let summary = fx.run(&Settings::default(), &silent(), "q\n").unwrap();
        assert!(summary.updates.is_none());
        assert!(fx.runtime.mutations().is_empty());
    }

    #[test]
    fn unreachable_runtime_is_fatal() {
        let mut fx = Fixture::new();
        fx.runtime.unreachable = true;
        let err = fx.run(&auto(), &silent(), "").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_discovery_is_a_clean_cycle() {
        let fx = Fixture::new();
        let summary = fx.run(&auto(), &silent(), "").unwrap();
        assert_eq!(summary.discovered, 0);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn disabled_checks_only_discover() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let settings = Settings {
            check: false,
            ..auto()
        };
        let summary = fx.run(&settings, &silent(), "").unwrap();
        assert_eq!(summary.discovered, 1);
        assert_eq!(summary.checked, 0);
    }

    #[test]
    fn unresolvable_images_are_counted_not_fatal() {
        let mut fx = Fixture::new();
        let mut broken = container("broken", "acme/app", 30);
        broken.image_reference = "   ".into();
        fx.add(broken, OLD);
        fx.add_service("web", OLD);
        let summary = fx.run(&auto(), &silent(), "").unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.updates.as_ref().unwrap().success_count(), 1);
    }

    #[test]
    fn standalone_failure_keeps_cycle_successful() {
        let mut fx = Fixture::new();
        fx.add(container("solo", "acme/solo:2", 30), OLD);
        let summary = fx.run(&auto(), &silent(), "").unwrap();

        let updates = summary.updates.as_ref().unwrap();
        assert_eq!(updates.failure_count(), 1);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn expired_backups_are_swept_after_a_real_cycle() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        fx.runtime.images.push(LocalImage {
            repository: "dockcheck/web".into(),
            tag: "2020-01-01_0000_1.0".into(),
            id: "sha256:ancient".into(),
        });
        let settings = Settings {
            backup_days: 7,
            ..auto()
        };
        let summary = fx.run(&settings, &silent(), "").unwrap();

        assert_eq!(summary.backups_removed, 1);
        let mutations = fx.runtime.mutations();
        assert!(mutations[0].starts_with("tag sha256:img-web dockcheck/web:"));
        assert_eq!(mutations.last().unwrap(), "rmi dockcheck/web:2020-01-01_0000_1.0");
    }

    #[test]
    fn expired_backups_are_swept_when_nothing_needs_updating() {
        let mut fx = Fixture::new();
        fx.add_service("web", NEW);
        fx.runtime.images.push(LocalImage {
            repository: "dockcheck/web".into(),
            tag: "2020-01-01_0000_1.0".into(),
            id: "sha256:ancient".into(),
        });
        let settings = Settings {
            backup_days: 7,
            ..auto()
        };
        let summary = fx.run(&settings, &silent(), "").unwrap();

        assert_eq!(summary.up_to_date, 1);
        assert!(summary.updates.is_none());
        assert_eq!(summary.backups_removed, 1);
        assert_eq!(fx.runtime.mutations(), vec!["rmi dockcheck/web:2020-01-01_0000_1.0"]);
    }

    #[test]
    fn notify_only_cycle_still_sweeps_backups() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        fx.runtime.images.push(LocalImage {
            repository: "dockcheck/web".into(),
            tag: "2020-01-01_0000_1.0".into(),
            id: "sha256:ancient".into(),
        });
        let settings = Settings {
            notify_only: true,
            backup_days: 7,
            ..Default::default()
        };
        let summary = fx.run(&settings, &silent(), "").unwrap();

        assert_eq!(summary.candidates, vec!["web"]);
        assert_eq!(summary.backups_removed, 1);
        assert_eq!(fx.runtime.mutations(), vec!["rmi dockcheck/web:2020-01-01_0000_1.0"]);
    }

    #[test]
    fn cancelled_cycle_stops_before_checking() {
        let mut fx = Fixture::new();
        fx.add_service("web", OLD);
        let registry =
            RegistryResolver::new(vec![ScriptedSource::ok("s", NEW)], Duration::from_secs(1));
        let notifier = silent();
        let mut collab = Collaborators {
            runtime: &fx.runtime,
            compose: &fx.runtime,
            registry: &registry,
            notifier: &notifier,
            input: Box::new(Cursor::new(String::new())),
            show_progress: false,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = run_cycle(&auto(), &mut collab, &cancel).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.exit_code(), 130);
        assert!(fx.runtime.mutations().is_empty());
    }

    #[test]
    fn run_mode_precedence() {
        let both = Settings {
            dry_run: true,
            auto_update: true,
            ..Default::default()
        };
        assert_eq!(RunMode::from_settings(&both), RunMode::DryRun);
        assert_eq!(RunMode::from_settings(&auto()), RunMode::Auto);
        assert_eq!(RunMode::from_settings(&Settings::default()), RunMode::Interactive);
    }

    #[test]
    fn progress_bar_is_hidden_only_when_prompting() {
        assert!(!RunMode::Interactive.shows_progress());
        assert!(RunMode::Auto.shows_progress());
        assert!(RunMode::DryRun.shows_progress());
        assert!(RunMode::NotifyOnly.shows_progress());
    }

    #[test]
    fn test_notify_requires_channels() {
        assert!(matches!(test_notify(&silent()), Err(DockcheckError::Config(_))));
        let channel = RecordingChannel::new("memory");
        test_notify(&Notifier::new(vec![channel.clone()])).unwrap();
        assert_eq!(channel.titles(), vec!["dockcheck: test notification"]);
    }

    #[test]
    fn cleanup_backups_honours_dry_run() {
        let runtime = FakeRuntime {
            images: vec![LocalImage {
                repository: "dockcheck/web".into(),
                tag: "2020-01-01_0000_latest".into(),
                id: "sha256:old".into(),
            }],
            ..Default::default()
        };
        cleanup_backups(&runtime, 1, true).unwrap();
        assert!(runtime.mutations().is_empty());
        cleanup_backups(&runtime, 1, false).unwrap();
        assert_eq!(runtime.mutations(), vec!["rmi dockcheck/web:2020-01-01_0000_latest"]);
        list_backups(&runtime).unwrap();
    }

    #[test]
    fn configure_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockcheck.toml");
        assert_eq!(execute_configure(Some(path.as_path())).unwrap(), path);
        assert!(execute_configure(Some(path.as_path())).is_err());
    }
}
