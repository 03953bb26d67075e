use crate::digest::serialize_repo_digests;
use crate::error::Result;
use crate::runtime::{ContainerRecord, ContainerRuntime};
use tracing::debug;

/// IdentityResolver produces the local content identity of a container's image.
pub struct IdentityResolver<'a> {
    runtime: &'a dyn ContainerRuntime,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self { runtime }
    }

    /// Repo-digests of the container's image as a list string, or the image id
    /// itself for images that were built locally and never pulled.
    pub fn resolve_local(&self, container: &ContainerRecord) -> Result<String> {
        let digests = self.runtime.image_repo_digests(&container.image_id)?;
        if digests.is_empty() {
            debug!(container = %container.name, "no repo digests, using image id");
            return Ok(container.image_id.clone());
        }
        Ok(serialize_repo_digests(&digests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::{container, FakeRuntime};

    #[test]
    fn uses_repo_digests_when_present() {
        let web = container("web", "acme/app", 10);
        let mut runtime = FakeRuntime::with_containers(vec![web.clone()]);
        runtime.repo_digests.insert(
            web.image_id.clone(),
            vec!["docker.io/acme/app@sha256:AAA".to_string()],
        );
        let local = IdentityResolver::new(&runtime).resolve_local(&web).unwrap();
        assert_eq!(local, "[docker.io/acme/app@sha256:AAA]");
    }

    #[test]
    fn falls_back_to_image_id() {
        let built = container("built", "local/thing", 10);
        let runtime = FakeRuntime::with_containers(vec![built.clone()]);
        let local = IdentityResolver::new(&runtime).resolve_local(&built).unwrap();
        assert_eq!(local, built.image_id);
    }
}
