// Update module - applies selected updates one container at a time
//
// - context: candidates, the per-container state machine and the pass report
// - interaction: operator prompt for interactive runs
// - orchestrator: backup, compose pull/up and prune
pub mod context;
pub mod interaction;
pub mod orchestrator;

pub use context::{UpdateCandidate, UpdateReport};
pub use interaction::UpdateInteraction;
pub use orchestrator::{OrchestratorOptions, UpdateOrchestrator};
