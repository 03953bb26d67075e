use crate::error::Result;
use jiff::Timestamp;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod docker;
pub use docker::DockerCli;

pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
pub const COMPOSE_WORKDIR_LABEL: &str = "com.docker.compose.project.working_dir";
pub const COMPOSE_CONFIG_FILES_LABEL: &str = "com.docker.compose.project.config_files";
pub const RESTART_STACK_LABEL: &str = "mag37.dockcheck.restart-stack";

/// A container as seen by one check cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    /// Image string the container was started from (e.g. "nginx:1.25").
    pub image_reference: String,
    /// Content id of the image the container runs.
    pub image_id: String,
    pub status: String,
    pub created_at: Timestamp,
    pub labels: BTreeMap<String, String>,
    pub compose_service: Option<String>,
    /// Every `-f` file of the compose project, in the order compose was given them.
    pub compose_files: Vec<PathBuf>,
}

impl ContainerRecord {
    pub fn is_compose_managed(&self) -> bool {
        self.compose_service.is_some() && !self.compose_files.is_empty()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn wants_stack_restart(&self) -> bool {
        self.label(RESTART_STACK_LABEL)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// An image stored locally, as listed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub repository: String,
    pub tag: String,
    pub id: String,
}

/// Query and mutation surface of the container runtime.
pub trait ContainerRuntime: Send + Sync {
    /// Ids of running containers, or of all containers when `include_stopped`.
    fn list_containers(&self, include_stopped: bool) -> Result<Vec<String>>;

    /// Ids of containers managed by a compose manifest.
    fn list_compose_containers(&self, manifest: &Path) -> Result<Vec<String>>;

    fn inspect_container(&self, id: &str) -> Result<ContainerRecord>;

    /// Repo-digests recorded for an image; empty for never-pulled images.
    fn image_repo_digests(&self, image_id: &str) -> Result<Vec<String>>;

    fn tag_image(&self, source: &str, target: &str) -> Result<()>;

    fn remove_image(&self, reference: &str) -> Result<()>;

    fn prune_dangling_images(&self) -> Result<()>;

    fn pull_image(&self, reference: &str) -> Result<()>;

    /// Images whose repository starts with `repository_prefix`.
    fn list_images(&self, repository_prefix: &str) -> Result<Vec<LocalImage>>;
}

/// Compose lifecycle control for one project, given by its manifest files.
pub trait ComposeControl: Send + Sync {
    fn pull_service(&self, manifests: &[PathBuf], service: &str) -> Result<()>;

    fn up_service(&self, manifests: &[PathBuf], service: &str, force_recreate: bool) -> Result<()>;

    /// Recreates every service of the project.
    fn up_project(&self, manifests: &[PathBuf], force_recreate: bool) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory runtime used by the engine tests.

    use super::*;
    use crate::error::DockcheckError;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeRuntime {
        pub unreachable: bool,
        /// Ids whose inspect finds the daemon gone.
        pub lost_ids: Vec<String>,
        pub containers: Vec<ContainerRecord>,
        pub compose_ids: Vec<String>,
        pub repo_digests: BTreeMap<String, Vec<String>>,
        pub images: Vec<LocalImage>,
        pub failing_pulls: Vec<String>,
        pub failing_services: Vec<String>,
        pub fail_tagging: bool,
        /// Every mutating call, in order.
        pub mutations: Mutex<Vec<String>>,
    }

    impl FakeRuntime {
        pub fn with_containers(containers: Vec<ContainerRecord>) -> Self {
            Self {
                containers,
                ..Default::default()
            }
        }

        pub fn mutations(&self) -> Vec<String> {
            self.mutations.lock().unwrap().clone()
        }

        fn record(&self, entry: String) {
            self.mutations.lock().unwrap().push(entry);
        }
    }

    impl ContainerRuntime for FakeRuntime {
        fn list_containers(&self, _include_stopped: bool) -> Result<Vec<String>> {
            if self.unreachable {
                return Err(DockcheckError::RuntimeUnavailable("daemon down".into()));
            }
            Ok(self.containers.iter().map(|c| c.id.clone()).collect())
        }

        fn list_compose_containers(&self, _manifest: &Path) -> Result<Vec<String>> {
            if self.unreachable {
                return Err(DockcheckError::RuntimeUnavailable("daemon down".into()));
            }
            Ok(self.compose_ids.clone())
        }

        fn inspect_container(&self, id: &str) -> Result<ContainerRecord> {
            if self.lost_ids.iter().any(|l| l == id) {
                return Err(DockcheckError::RuntimeUnavailable("daemon went away".into()));
            }
            self.containers
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or_else(|| DockcheckError::CommandFailed {
                    command: format!("inspect {id}"),
                    stderr: "no such container".into(),
                })
        }

        fn image_repo_digests(&self, image_id: &str) -> Result<Vec<String>> {
            Ok(self.repo_digests.get(image_id).cloned().unwrap_or_default())
        }

        fn tag_image(&self, source: &str, target: &str) -> Result<()> {
            if self.fail_tagging {
                return Err(DockcheckError::CommandFailed {
                    command: "tag".into(),
                    stderr: "disk full".into(),
                });
            }
            self.record(format!("tag {source} {target}"));
            Ok(())
        }

        fn remove_image(&self, reference: &str) -> Result<()> {
            self.record(format!("rmi {reference}"));
            Ok(())
        }

        fn prune_dangling_images(&self) -> Result<()> {
            self.record("prune".to_string());
            Ok(())
        }

        fn pull_image(&self, reference: &str) -> Result<()> {
            self.record(format!("pull {reference}"));
            if self.failing_pulls.iter().any(|p| p == reference) {
                return Err(DockcheckError::CommandFailed {
                    command: format!("pull {reference}"),
                    stderr: "manifest unknown".into(),
                });
            }
            Ok(())
        }

        fn list_images(&self, repository_prefix: &str) -> Result<Vec<LocalImage>> {
            Ok(self
                .images
                .iter()
                .filter(|i| i.repository.starts_with(repository_prefix))
                .cloned()
                .collect())
        }
    }

    impl ComposeControl for FakeRuntime {
        fn pull_service(&self, manifests: &[PathBuf], service: &str) -> Result<()> {
            self.record(format!("compose pull {} {service}", joined(manifests)));
            if self.failing_services.iter().any(|s| s == service) {
                return Err(DockcheckError::CommandFailed {
                    command: format!("compose pull {service}"),
                    stderr: "pull access denied".into(),
                });
            }
            Ok(())
        }

        fn up_service(
            &self,
            manifests: &[PathBuf],
            service: &str,
            force_recreate: bool,
        ) -> Result<()> {
            self.record(format!(
                "compose up {} {service} force={force_recreate}",
                joined(manifests)
            ));
            Ok(())
        }

        fn up_project(&self, manifests: &[PathBuf], force_recreate: bool) -> Result<()> {
            self.record(format!(
                "compose up {} * force={force_recreate}",
                joined(manifests)
            ));
            Ok(())
        }
    }

    fn joined(manifests: &[PathBuf]) -> String {
        manifests
            .iter()
            .map(|m| m.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// A running container created a little over `age_days` ago.
    pub fn container(name: &str, image: &str, age_days: i64) -> ContainerRecord {
        let created_at = Timestamp::now()
            .checked_sub(jiff::SignedDuration::from_secs(age_days * 86_400 + 60))
            .unwrap();
        ContainerRecord {
            id: format!("id-{name}"),
            name: name.to_string(),
            image_reference: image.to_string(),
            image_id: format!("sha256:img-{name}"),
            status: "running".to_string(),
            created_at,
            labels: BTreeMap::new(),
            compose_service: None,
            compose_files: Vec::new(),
        }
    }

    pub fn compose_container(name: &str, image: &str, manifest: &str) -> ContainerRecord {
        let mut c = container(name, image, 30);
        c.compose_service = Some(name.to_string());
        c.compose_files = vec![PathBuf::from(manifest)];
        c
    }
}
