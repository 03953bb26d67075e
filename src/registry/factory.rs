use crate::config::Settings;
use crate::registry::{DigestSource, ManifestInspectSource, RegctlSource, RegistryResolver};
use std::sync::Arc;
use std::time::Duration;

pub struct RegistryFactory;

impl RegistryFactory {
    /// regctl first, the runtime's manifest inspection as fallback.
    pub fn create_resolver(settings: &Settings) -> RegistryResolver {
        let sources: Vec<Arc<dyn DigestSource>> = vec![
            Arc::new(RegctlSource::new(settings.regctl_bin.clone())),
            Arc::new(ManifestInspectSource::new(settings.docker_bin.clone())),
        ];
        RegistryResolver::new(
            sources,
            Duration::from_secs(settings.registry_timeout_secs.max(1)),
        )
    }
}
