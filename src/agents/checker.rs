use crate::agents::filter::{FilterChain, FilterDecision, RejectReason};
use crate::agents::identity::IdentityResolver;
use crate::agents::update::UpdateCandidate;
use crate::cancel::CancellationToken;
use crate::digest::DigestPair;
use crate::error::{DockcheckError, Result};
use crate::registry::{ImageReference, RegistryResolver};
use crate::runtime::ContainerRuntime;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use jiff::Timestamp;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::{debug, warn};

/// What happened to one discovered container.
#[derive(Debug)]
enum CheckOutcome {
    Candidate(UpdateCandidate),
    UpToDate(String),
    Filtered(String, RejectReason),
    Errored(String, String),
}

/// Aggregate of one detection pass, in discovery order.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Containers that reached the digest comparison.
    pub checked: usize,
    pub up_to_date: Vec<String>,
    pub candidates: Vec<UpdateCandidate>,
    pub filtered: Vec<(String, RejectReason)>,
    pub errors: Vec<(String, String)>,
    pub cancelled: bool,
}

impl CheckReport {
    fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Candidate(c) => {
                self.checked += 1;
                self.candidates.push(c);
            }
            CheckOutcome::UpToDate(name) => {
                self.checked += 1;
                self.up_to_date.push(name);
            }
            CheckOutcome::Filtered(name, reason) => self.filtered.push((name, reason)),
            CheckOutcome::Errored(name, reason) => self.errors.push((name, reason)),
        }
    }

    pub fn candidate_names(&self) -> Vec<&str> {
        self.candidates.iter().map(UpdateCandidate::name).collect()
    }
}

/// UpdateChecker runs inspect, filter, identity and registry lookups per container.
pub struct UpdateChecker<'a> {
    runtime: &'a dyn ContainerRuntime,
    registry: &'a RegistryResolver,
    filters: &'a FilterChain,
    concurrency: usize,
    show_progress: bool,
}

impl<'a> UpdateChecker<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        registry: &'a RegistryResolver,
        filters: &'a FilterChain,
    ) -> Self {
        Self {
            runtime,
            registry,
            filters,
            concurrency: 1,
            show_progress: true,
        }
    }

    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Checks every id. Only an unreachable runtime aborts; everything else is
    /// recorded against the container and the pass continues.
    pub fn check_all(&self, ids: &[String], cancel: &CancellationToken) -> Result<CheckReport> {
        let now = Timestamp::now();
        let pb = self.progress_bar(ids.len());

        let outcomes = if self.concurrency > 1 && ids.len() > 1 {
            self.check_parallel(ids, now, cancel, &pb)?
        } else {
            self.check_sequential(ids, now, cancel, &pb)?
        };
        pb.finish_and_clear();

        let mut report = CheckReport {
            cancelled: outcomes.len() < ids.len() || cancel.is_cancelled(),
            ..Default::default()
        };
        for outcome in outcomes {
            report.record(outcome);
        }
        Ok(report)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        let pb = ProgressBar::new(len as u64);
        if !self.show_progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::default_bar().template("  [{bar:40}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }

    fn check_sequential(
        &self,
        ids: &[String],
        now: Timestamp,
        cancel: &CancellationToken,
        pb: &ProgressBar,
    ) -> Result<Vec<CheckOutcome>> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            if cancel.is_cancelled() {
                break;
            }
            pb.set_message(format!("Checking {}", short_id(id)));
            outcomes.push(self.check_one(id, now)?);
            pb.inc(1);
        }
        Ok(outcomes)
    }

    /// Workers pull ids from a shared index; results keep discovery order.
    fn check_parallel(
        &self,
        ids: &[String],
        now: Timestamp,
        cancel: &CancellationToken,
        pb: &ProgressBar,
    ) -> Result<Vec<CheckOutcome>> {
        let next = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<Result<CheckOutcome>>>> =
            ids.iter().map(|_| Mutex::new(None)).collect();
        let workers = self.concurrency.min(ids.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(id) = ids.get(index) else { break };
                        let outcome = self.check_one(id, now);
                        let fatal = outcome.is_err();
                        if let Ok(mut slot) = slots[index].lock() {
                            *slot = Some(outcome);
                        }
                        pb.inc(1);
                        if fatal {
                            cancel_siblings(&next, ids.len());
                            break;
                        }
                    }
                });
            }
        });

        let mut outcomes = Vec::with_capacity(ids.len());
        for slot in slots {
            let filled = slot.into_inner().ok().flatten();
            match filled {
                Some(outcome) => outcomes.push(outcome?),
                // Unfilled slots only follow a cancellation; stop at the first gap.
                None => break,
            }
        }
        Ok(outcomes)
    }

    fn check_one(&self, id: &str, now: Timestamp) -> Result<CheckOutcome> {
        let container = match self.runtime.inspect_container(id) {
            Ok(c) => c,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(container = id, error = %e, "inspect failed");
                return Ok(CheckOutcome::Errored(id.to_string(), e.to_string()));
            }
        };
        let name = container.name.clone();

        if let FilterDecision::Reject(reason) = self.filters.matches(&container, now) {
            debug!(container = %name, %reason, "filtered");
            return Ok(CheckOutcome::Filtered(name, reason));
        }

        let digests = ImageReference::parse(&container.image_reference).and_then(|reference| {
            let local = IdentityResolver::new(self.runtime).resolve_local(&container)?;
            let remote = self.registry.resolve_remote(&reference)?;
            Ok(DigestPair::new(local, remote))
        });

        match digests {
            Ok(pair) if pair.has_update() => {
                debug!(
                    container = %name,
                    local = %pair.local,
                    remote = %pair.remote,
                    "update available"
                );
                Ok(CheckOutcome::Candidate(UpdateCandidate {
                    container,
                    digest_pair: pair,
                }))
            }
            Ok(_) => Ok(CheckOutcome::UpToDate(name)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                if !matches!(e, DockcheckError::DigestUnresolvable { .. }) {
                    warn!(container = %name, error = %e, "check failed");
                }
                Ok(CheckOutcome::Errored(name, e.to_string()))
            }
        }
    }
}

fn cancel_siblings(next: &AtomicUsize, len: usize) {
    next.store(len, Ordering::SeqCst);
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
