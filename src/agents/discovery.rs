use crate::config::Settings;
use crate::error::{DockcheckError, Result};
use crate::runtime::ContainerRuntime;
use crate::utils::PathValidator;
use std::path::PathBuf;
use tracing::{debug, info};

/// ContainerDiscovery enumerates the containers a cycle will consider.
pub struct ContainerDiscovery<'a> {
    runtime: &'a dyn ContainerRuntime,
    compose_manifest: Option<PathBuf>,
    include_stopped: bool,
}

impl<'a> ContainerDiscovery<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, settings: &Settings) -> Self {
        let compose_manifest = if settings.use_compose {
            settings.compose_file.clone()
        } else {
            None
        };
        Self {
            runtime,
            compose_manifest,
            include_stopped: settings.include_stopped,
        }
    }

    /// Returns container ids; an empty list is a valid (quiet) outcome.
    ///
    /// Only an unreachable runtime is an error here.
    pub fn discover(&self) -> Result<Vec<String>> {
        let ids = match &self.compose_manifest {
            Some(manifest) => {
                let manifest = PathValidator::validate_manifest_path(manifest)
                    .map_err(|e| DockcheckError::Config(e.to_string()))?;
                debug!(manifest = %manifest.display(), "discovering compose-managed containers");
                self.runtime.list_compose_containers(&manifest)?
            }
            None => self.runtime.list_containers(self.include_stopped)?,
        };

        info!(count = ids.len(), "discovered containers");
        Ok(ids)
    }
}
