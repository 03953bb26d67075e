use crate::digest::DigestPair;
use crate::runtime::ContainerRecord;
use std::fmt;

/// A container that passed the filters and whose digests disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCandidate {
    pub container: ContainerRecord,
    pub digest_pair: DigestPair,
}

impl UpdateCandidate {
    pub fn name(&self) -> &str {
        &self.container.name
    }
}

/// Lifecycle of one candidate inside the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Pending,
    BackingUp,
    Updating,
    Verifying,
    Done,
    Failed,
}

impl UpdateState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UpdateState::Done | UpdateState::Failed)
    }

    /// Whether `next` is a legal step from `self`.
    pub fn can_transition_to(self, next: UpdateState) -> bool {
        use UpdateState::*;
        matches!(
            (self, next),
            (Pending, BackingUp)
                | (Pending, Updating)
                | (BackingUp, Updating)
                | (Updating, Verifying)
                | (Verifying, Done)
                | (Pending | BackingUp | Updating | Verifying, Failed)
        )
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdateState::Pending => "pending",
            UpdateState::BackingUp => "backing-up",
            UpdateState::Updating => "updating",
            UpdateState::Verifying => "verifying",
            UpdateState::Done => "done",
            UpdateState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome for one candidate; lives only until the cycle summary is reported.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub container_name: String,
    pub succeeded: bool,
    pub backup_tag: Option<String>,
    pub final_state: UpdateState,
    /// Failure reason or guidance; warnings for successful updates.
    pub message: Option<String>,
    /// Nothing was mutated; `succeeded` means "would update".
    pub dry_run: bool,
}

/// Tracks the results of one orchestration pass.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub results: Vec<UpdateResult>,
    pub pruned: bool,
    pub cancelled: bool,
}

impl UpdateReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &UpdateResult> {
        self.results.iter().filter(|r| r.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &UpdateResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_transitions() {
        use UpdateState::*;
        assert!(Pending.can_transition_to(BackingUp));
        assert!(Pending.can_transition_to(Updating));
        assert!(BackingUp.can_transition_to(Updating));
        assert!(Updating.can_transition_to(Verifying));
        assert!(Verifying.can_transition_to(Done));
        assert!(Updating.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Done));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Updating));
        assert!(!Verifying.can_transition_to(BackingUp));

        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Verifying.is_terminal());
    }

    #[test]
    fn report_counts() {
        let result = |name: &str, ok: bool| UpdateResult {
            container_name: name.into(),
            succeeded: ok,
            backup_tag: None,
            final_state: if ok { UpdateState::Done } else { UpdateState::Failed },
            message: None,
            dry_run: false,
        };
        let report = UpdateReport {
            results: vec![result("a", true), result("b", false), result("c", true)],
            ..Default::default()
        };
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_empty());
    }
}
