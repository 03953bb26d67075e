use crate::agents::backup::BackupManager;
use crate::agents::update::context::{UpdateCandidate, UpdateReport, UpdateResult, UpdateState};
use crate::cancel::CancellationToken;
use crate::config::Settings;
use crate::error::{DockcheckError, Result};
use crate::runtime::{ComposeControl, ContainerRuntime};
use crate::utils::PathValidator;
use colored::Colorize;
use jiff::Zoned;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Knobs the orchestrator reads from the settings.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    pub backup: bool,
    pub force_recreate: bool,
    pub auto_prune: bool,
    pub dry_run: bool,
    /// Manifest given on the command line; wins over the one recorded in labels.
    pub compose_file: Option<PathBuf>,
}

impl OrchestratorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            backup: settings.backup_days > 0,
            force_recreate: settings.force_recreate,
            auto_prune: settings.auto_prune,
            dry_run: settings.dry_run,
            compose_file: if settings.use_compose {
                settings.compose_file.clone()
            } else {
                None
            },
        }
    }
}

/// UpdateOrchestrator applies updates one container at a time.
///
/// Each candidate runs through backup, update and verification on its own;
/// a failure is recorded and the next candidate is processed regardless.
pub struct UpdateOrchestrator<'a> {
    runtime: &'a dyn ContainerRuntime,
    compose: &'a dyn ComposeControl,
    options: OrchestratorOptions,
}

/// State of the candidate currently being processed.
struct CandidateRun<'c> {
    candidate: &'c UpdateCandidate,
    state: UpdateState,
    backup_tag: Option<String>,
    warnings: Vec<String>,
}

impl<'c> CandidateRun<'c> {
    fn new(candidate: &'c UpdateCandidate) -> Self {
        Self {
            candidate,
            state: UpdateState::Pending,
            backup_tag: None,
            warnings: Vec::new(),
        }
    }

    fn advance(&mut self, next: UpdateState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(container = %self.candidate.name(), from = %self.state, to = %next, "update state");
        self.state = next;
    }

    fn finish(mut self, outcome: Result<()>, dry_run: bool) -> UpdateResult {
        let message = match outcome {
            Ok(()) => {
                self.advance(UpdateState::Done);
                (!self.warnings.is_empty()).then(|| self.warnings.join("; "))
            }
            Err(e) => {
                self.advance(UpdateState::Failed);
                Some(e.to_string())
            }
        };
        debug_assert!(self.state.is_terminal());
        UpdateResult {
            container_name: self.candidate.name().to_string(),
            succeeded: self.state == UpdateState::Done,
            backup_tag: self.backup_tag,
            final_state: self.state,
            message,
            dry_run,
        }
    }
}

impl<'a> UpdateOrchestrator<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        compose: &'a dyn ComposeControl,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            runtime,
            compose,
            options,
        }
    }

    /// Applies every candidate in order, then prunes once if enabled.
    pub fn apply(
        &self,
        candidates: &[UpdateCandidate],
        cancel: &CancellationToken,
    ) -> UpdateReport {
        let mut report = UpdateReport::new();
        let backups = BackupManager::new(self.runtime, self.options.dry_run);

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    remaining = candidates.len() - index,
                    "interrupted, leaving remaining candidates untouched"
                );
                report.cancelled = true;
                break;
            }

            println!(
                "\n{} {} ({}/{})",
                "Updating".cyan().bold(),
                candidate.name().white().bold(),
                index + 1,
                candidates.len()
            );
            let result = self.apply_one(candidate, &backups);
            print_result(&result);
            report.results.push(result);
        }

        if self.options.auto_prune && !report.cancelled {
            report.pruned = self.prune();
        }

        report
    }

    fn apply_one(&self, candidate: &UpdateCandidate, backups: &BackupManager<'_>) -> UpdateResult {
        let mut run = CandidateRun::new(candidate);

        if self.options.backup {
            run.advance(UpdateState::BackingUp);
            match backups.create(&candidate.container, &Zoned::now()) {
                Ok(tag) => run.backup_tag = Some(tag.reference()),
                Err(e) => {
                    warn!(container = %candidate.name(), error = %e, "continuing without backup");
                    run.warnings.push(e.to_string());
                }
            }
        }

        run.advance(UpdateState::Updating);
        if let Err(e) = self.update(candidate) {
            warn!(container = %candidate.name(), error = %e, "update failed");
            return run.finish(Err(e), self.options.dry_run);
        }

        // The pull/up exit status is the verification; service state is checked per cycle.
        run.advance(UpdateState::Verifying);
        run.finish(Ok(()), self.options.dry_run)
    }

    fn update(&self, candidate: &UpdateCandidate) -> Result<()> {
        let container = &candidate.container;
        let manifests = match &self.options.compose_file {
            Some(file) => vec![file.clone()],
            None => container.compose_files.clone(),
        };

        match &container.compose_service {
            Some(service) if !manifests.is_empty() => {
                self.update_compose_service(candidate, service, &manifests)
            }
            _ => self.update_standalone(candidate),
        }
    }

    fn update_compose_service(
        &self,
        candidate: &UpdateCandidate,
        service: &str,
        manifests: &[PathBuf],
    ) -> Result<()> {
        let name = candidate.name();
        let failed = |reason: String| DockcheckError::UpdateFailed {
            container: name.to_string(),
            reason,
        };
        let restart_stack = candidate.container.wants_stack_restart();
        let force = self.options.force_recreate;

        // Checked in dry runs too.
        let manifests = manifests
            .iter()
            .map(PathValidator::validate_manifest_path)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| failed(e.to_string()))?;

        if self.options.dry_run {
            info!(
                container = name,
                service,
                manifests = manifests.len(),
                restart_stack,
                force_recreate = force,
                "dry run: would pull and recreate"
            );
            return Ok(());
        }

        self.compose
            .pull_service(&manifests, service)
            .map_err(|e| failed(format!("pull: {e}")))?;

        let up = if restart_stack {
            self.compose.up_project(&manifests, force)
        } else {
            self.compose.up_service(&manifests, service, force)
        };
        up.map_err(|e| failed(format!("recreate: {e}")))?;

        info!(container = name, service, "service recreated");
        Ok(())
    }

    /// Pulls the new image; recreating an ad hoc `run` container is left to the operator.
    fn update_standalone(&self, candidate: &UpdateCandidate) -> Result<()> {
        let container = &candidate.container;
        if self.options.dry_run {
            info!(
                container = %container.name,
                image = %container.image_reference,
                "dry run: would pull"
            );
        } else {
            self.runtime
                .pull_image(&container.image_reference)
                .map_err(|e| DockcheckError::UpdateFailed {
                    container: container.name.clone(),
                    reason: format!("pull: {e}"),
                })?;
        }

        Err(DockcheckError::StandaloneUpdateUnsupported {
            container: container.name.clone(),
            image: container.image_reference.clone(),
        })
    }

    fn prune(&self) -> bool {
        if self.options.dry_run {
            info!("dry run: would prune dangling images");
            return true;
        }
        match self.runtime.prune_dangling_images() {
            Ok(()) => {
                println!("{}", "✓ Pruned dangling images".green());
                true
            }
            Err(e) => {
                warn!(error = %e, "image prune failed");
                false
            }
        }
    }
}

fn print_result(result: &UpdateResult) {
    let verb = if result.dry_run { "Would update" } else { "Updated" };
    if result.succeeded {
        println!("{}", format!("✓ {} {}", verb, result.container_name).green());
        if let Some(tag) = &result.backup_tag {
            println!("   {} {}", "backup:".dimmed(), tag.dimmed());
        }
        if let Some(msg) = &result.message {
            println!("   {} {}", "warning:".yellow(), msg);
        }
    } else {
        println!("{}", format!("✗ {} failed", result.container_name).red());
        if let Some(msg) = &result.message {
            println!("   {}", msg.yellow());
        }
    }
}
