use super::{
    ComposeControl, ContainerRecord, ContainerRuntime, LocalImage, COMPOSE_CONFIG_FILES_LABEL,
    COMPOSE_SERVICE_LABEL, COMPOSE_WORKDIR_LABEL,
};
use crate::error::{DockcheckError, Result};
use crate::utils::process;
use crate::utils::PathValidator;
use jiff::Timestamp;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Read-only queries should never hang a cycle; pulls and recreates may take long.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// `ContainerRuntime` and `ComposeControl` over the `docker` CLI.
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn query(&self, args: &[&str]) -> Result<String> {
        process::run_checked(&self.binary, args, Some(QUERY_TIMEOUT))
    }

    fn mutate(&self, args: &[&str]) -> Result<()> {
        process::run_checked(&self.binary, args, None).map(|_| ())
    }

    fn mutate_owned(&self, args: &[String]) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.mutate(&args)
    }

    /// Listing is the first call of every cycle; any failure there means the
    /// daemon (or the CLI) is not usable.
    fn list_ids(&self, args: &[&str]) -> Result<Vec<String>> {
        let stdout = self.query(args).map_err(|e| match e {
            DockcheckError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                DockcheckError::RuntimeUnavailable(format!("'{}' not found in PATH", self.binary))
            }
            DockcheckError::CommandFailed { stderr, .. } => {
                DockcheckError::RuntimeUnavailable(stderr)
            }
            DockcheckError::CommandTimeout { seconds, .. } => DockcheckError::RuntimeUnavailable(
                format!("no answer from the daemon within {seconds}s"),
            ),
            other => other,
        })?;
        Ok(parse_id_lines(&stdout))
    }
}

impl ContainerRuntime for DockerCli {
    fn list_containers(&self, include_stopped: bool) -> Result<Vec<String>> {
        if include_stopped {
            self.list_ids(&["ps", "-aq"])
        } else {
            self.list_ids(&["ps", "-q"])
        }
    }

    fn list_compose_containers(&self, manifest: &Path) -> Result<Vec<String>> {
        let manifest = manifest.to_string_lossy();
        self.list_ids(&["compose", "-f", manifest.as_ref(), "ps", "-q"])
    }

    fn inspect_container(&self, id: &str) -> Result<ContainerRecord> {
        let stdout = self.query(&["container", "inspect", id])?;
        parse_container_inspect(&stdout)
    }

    fn image_repo_digests(&self, image_id: &str) -> Result<Vec<String>> {
        let stdout = self.query(&["image", "inspect", image_id])?;
        parse_repo_digests(&stdout)
    }

    fn tag_image(&self, source: &str, target: &str) -> Result<()> {
        self.mutate(&["tag", source, target])
    }

    fn remove_image(&self, reference: &str) -> Result<()> {
        self.mutate(&["rmi", reference])
    }

    fn prune_dangling_images(&self) -> Result<()> {
        self.mutate(&["image", "prune", "-f"])
    }

    fn pull_image(&self, reference: &str) -> Result<()> {
        self.mutate(&["pull", reference])
    }

    fn list_images(&self, repository_prefix: &str) -> Result<Vec<LocalImage>> {
        let filter = format!("reference={repository_prefix}*");
        let stdout =
            self.query(&["images", "--filter", filter.as_str(), "--format", "{{json .}}"])?;
        let images = parse_image_lines(&stdout)?;
        Ok(images
            .into_iter()
            .filter(|i| i.repository.starts_with(repository_prefix))
            .collect())
    }
}

impl ComposeControl for DockerCli {
    fn pull_service(&self, manifests: &[PathBuf], service: &str) -> Result<()> {
        let mut args = compose_args(manifests);
        args.extend(["pull".to_string(), service.to_string()]);
        self.mutate_owned(&args)
    }

    fn up_service(&self, manifests: &[PathBuf], service: &str, force_recreate: bool) -> Result<()> {
        let mut args = compose_up_args(manifests, force_recreate);
        args.push(service.to_string());
        self.mutate_owned(&args)
    }

    fn up_project(&self, manifests: &[PathBuf], force_recreate: bool) -> Result<()> {
        self.mutate_owned(&compose_up_args(manifests, force_recreate))
    }
}

/// `compose` followed by one `-f` per manifest, in order.
fn compose_args(manifests: &[PathBuf]) -> Vec<String> {
    let mut args = vec!["compose".to_string()];
    for manifest in manifests {
        args.push("-f".to_string());
        args.push(manifest.to_string_lossy().into_owned());
    }
    args
}

fn compose_up_args(manifests: &[PathBuf], force_recreate: bool) -> Vec<String> {
    let mut args = compose_args(manifests);
    args.extend(["up".to_string(), "-d".to_string()]);
    if force_recreate {
        args.push("--force-recreate".to_string());
    }
    args
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedContainer {
    id: String,
    name: String,
    created: String,
    image: String,
    state: Option<InspectedState>,
    config: Option<InspectedConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedState {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedConfig {
    image: Option<String>,
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedImage {
    repo_digests: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ListedImage {
    #[serde(rename = "Repository")]
    repository: String,
    #[serde(rename = "Tag")]
    tag: String,
    #[serde(rename = "ID")]
    id: String,
}

fn parse_id_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_container_inspect(json: &str) -> Result<ContainerRecord> {
    let mut inspected: Vec<InspectedContainer> = serde_json::from_str(json)?;
    if inspected.is_empty() {
        return Err(DockcheckError::CommandFailed {
            command: "docker container inspect".to_string(),
            stderr: "empty inspect result".to_string(),
        });
    }
    let c = inspected.swap_remove(0);

    let created_at: Timestamp = c.created.parse().map_err(|e| DockcheckError::CommandFailed {
        command: "docker container inspect".to_string(),
        stderr: format!("unparsable creation time '{}': {e}", c.created),
    })?;

    let (image_reference, labels) = match c.config {
        Some(cfg) => (cfg.image.unwrap_or_default(), cfg.labels.unwrap_or_default()),
        None => (String::new(), BTreeMap::new()),
    };

    let compose_service = labels.get(COMPOSE_SERVICE_LABEL).cloned();
    let compose_files = PathValidator::manifests_from_labels(
        labels.get(COMPOSE_WORKDIR_LABEL).map(String::as_str),
        labels.get(COMPOSE_CONFIG_FILES_LABEL).map(String::as_str),
    );

    let record = ContainerRecord {
        id: c.id,
        name: c.name.trim_start_matches('/').to_string(),
        image_reference,
        image_id: c.image,
        status: c.state.and_then(|s| s.status).unwrap_or_default(),
        created_at,
        labels,
        compose_service,
        compose_files,
    };
    debug!(container = %record.name, image = %record.image_reference, "inspected container");
    Ok(record)
}

fn parse_repo_digests(json: &str) -> Result<Vec<String>> {
    let inspected: Vec<InspectedImage> = serde_json::from_str(json)?;
    Ok(inspected
        .into_iter()
        .next()
        .and_then(|i| i.repo_digests)
        .unwrap_or_default())
}

fn parse_image_lines(stdout: &str) -> Result<Vec<LocalImage>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let listed: ListedImage = serde_json::from_str(line)?;
            Ok(LocalImage {
                repository: listed.repository,
                tag: listed.tag,
                id: listed.id,
            })
        })
        .collect()
}
