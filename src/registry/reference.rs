//! Image reference parsing.
//!
//! Turns the image string a container was started from (`nginx`,
//! `acme/app:1.2`, `ghcr.io/org/tool:v3`, `registry:5000/x/y`) into its
//! registry, repository and tag.

use crate::error::{DockcheckError, Result};
use std::fmt;

pub const DOCKER_HUB: &str = "docker.io";
const DEFAULT_TAG: &str = "latest";
const OFFICIAL_NAMESPACE: &str = "library";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname, with port when one was given.
    pub registry: String,
    /// Repository path below the registry (e.g. "library/nginx").
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    /// Parse an image reference.
    ///
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `acme/app:1.2` → docker.io/acme/app:1.2
    /// - `ghcr.io/org/tool` → ghcr.io/org/tool:latest
    /// - `localhost:5000/app@sha256:…` → localhost:5000/app:latest
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() || reference.contains(char::is_whitespace) {
            return Err(DockcheckError::InvalidReference(reference.to_string()));
        }

        // A digest pin says nothing about which tag to follow, drop it.
        let name_tag = match reference.split_once('@') {
            Some((name, _digest)) => name,
            None => reference,
        };

        let (name, tag) = Self::split_tag(name_tag);
        let (registry, repository) = Self::split_registry(name);

        if repository.is_empty() || repository.ends_with('/') || tag.is_empty() {
            return Err(DockcheckError::InvalidReference(reference.to_string()));
        }

        Ok(Self {
            registry,
            repository,
            tag: tag.to_string(),
        })
    }

    /// Splits `name:tag`, only looking for the colon after the last slash so a
    /// registry port is never mistaken for a tag.
    fn split_tag(name_tag: &str) -> (&str, &str) {
        let last_segment_start = name_tag.rfind('/').map(|i| i + 1).unwrap_or(0);
        match name_tag[last_segment_start..].rfind(':') {
            Some(colon) => {
                let split = last_segment_start + colon;
                (&name_tag[..split], &name_tag[split + 1..])
            }
            None => (name_tag, DEFAULT_TAG),
        }
    }

    fn split_registry(name: &str) -> (String, String) {
        if let Some((first, rest)) = name.split_once('/') {
            if first.contains('.') || first.contains(':') || first == "localhost" {
                let registry = match first {
                    "index.docker.io" | "registry-1.docker.io" => DOCKER_HUB,
                    other => other,
                };
                if registry == DOCKER_HUB && !rest.contains('/') {
                    return (
                        registry.to_string(),
                        format!("{OFFICIAL_NAMESPACE}/{rest}"),
                    );
                }
                return (registry.to_string(), rest.to_string());
            }
            return (DOCKER_HUB.to_string(), name.to_string());
        }

        (DOCKER_HUB.to_string(), format!("{OFFICIAL_NAMESPACE}/{name}"))
    }

    pub fn is_docker_hub(&self) -> bool {
        self.registry == DOCKER_HUB
    }

    /// Shortest form the runtime accepts: docker.io and `library/` are implied.
    pub fn short_form(&self) -> String {
        if self.is_docker_hub() {
            let repo = self
                .repository
                .strip_prefix("library/")
                .unwrap_or(&self.repository);
            format!("{}:{}", repo, self.tag)
        } else {
            format!("{}/{}:{}", self.registry, self.repository, self.tag)
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}
