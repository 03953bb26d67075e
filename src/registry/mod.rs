use crate::error::{DockcheckError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod factory;
pub mod manifest;
pub mod reference;
pub mod regctl;

pub use factory::RegistryFactory;
pub use manifest::ManifestInspectSource;
pub use reference::ImageReference;
pub use regctl::RegctlSource;

/// Something that can tell us the digest a tag currently points at.
pub trait DigestSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_digest(&self, reference: &ImageReference, timeout: Duration) -> Result<String>;
}

/// Resolves remote digests by trying each source in order.
pub struct RegistryResolver {
    sources: Vec<Arc<dyn DigestSource>>,
    timeout: Duration,
}

impl RegistryResolver {
    pub fn new(sources: Vec<Arc<dyn DigestSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Returns the first digest any source produces.
    ///
    /// Later sources are only consulted when earlier ones fail; if all fail the
    /// container is skipped with `DigestUnresolvable`.
    pub fn resolve_remote(&self, reference: &ImageReference) -> Result<String> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.fetch_digest(reference, self.timeout) {
                Ok(digest) if !digest.trim().is_empty() => {
                    debug!(
                        source = source.name(),
                        image = %reference,
                        %digest,
                        "resolved remote digest"
                    );
                    return Ok(digest.trim().to_string());
                }
                Ok(_) => failures.push(format!("{}: empty digest", source.name())),
                Err(e) => {
                    debug!(
                        source = source.name(),
                        image = %reference,
                        error = %e,
                        "digest source failed"
                    );
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        let reason = if failures.is_empty() {
            "no digest sources configured".to_string()
        } else {
            failures.join("; ")
        };
        warn!(image = %reference, %reason, "registry unreachable");
        Err(DockcheckError::DigestUnresolvable {
            reference: reference.to_string(),
            reason,
        })
    }
}

/// Loose check that a string is an OCI digest (`algorithm:hex`).
pub fn looks_like_digest(value: &str) -> bool {
    match value.split_once(':') {
        Some((algo, hex)) => {
            !algo.is_empty()
                && algo
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '_' | '-'))
                && hex.len() >= 32
                && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
