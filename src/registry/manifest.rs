use crate::error::{DockcheckError, Result};
use crate::registry::{DigestSource, ImageReference};
use crate::utils::process;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Fallback digest source: the runtime's own `manifest inspect`.
pub struct ManifestInspectSource {
    docker_bin: String,
}

impl ManifestInspectSource {
    pub fn new(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
        }
    }
}

impl DigestSource for ManifestInspectSource {
    fn name(&self) -> &str {
        "manifest-inspect"
    }

    fn fetch_digest(&self, reference: &ImageReference, timeout: Duration) -> Result<String> {
        let image = reference.short_form();
        let stdout = process::run_checked(
            &self.docker_bin,
            &["manifest", "inspect", image.as_str()],
            Some(timeout),
        )?;

        first_digest(&stdout).ok_or_else(|| DockcheckError::DigestUnresolvable {
            reference: image,
            reason: "manifest has no digest field".to_string(),
        })
    }
}

/// Value of the first `"digest"` field in the raw manifest text.
///
/// Document order matters here (first entry of a manifest list), so the raw
/// text is scanned rather than a parsed map.
pub fn first_digest(manifest: &str) -> Option<String> {
    static DIGEST_FIELD: OnceLock<Regex> = OnceLock::new();
    let re = DIGEST_FIELD.get_or_init(|| {
        Regex::new(r#""digest"\s*:\s*"([^"]+)""#).expect("digest field regex is valid")
    });
    re.captures(manifest)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_digest_of_manifest_list() {
        let manifest = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.index.v1+json",
            "manifests": [
                {"mediaType": "application/vnd.oci.image.manifest.v1+json", "size": 1, "digest": "sha256:first", "platform": {"architecture": "amd64"}},
                {"mediaType": "application/vnd.oci.image.manifest.v1+json", "size": 1, "digest": "sha256:second", "platform": {"architecture": "arm64"}}
            ]
        }"#;
        assert_eq!(first_digest(manifest).as_deref(), Some("sha256:first"));
    }

    #[test]
    fn first_digest_of_single_manifest_is_config() {
        let manifest = r#"{"schemaVersion":2,"config":{"size":7023,"digest":"sha256:cfg"},"layers":[{"digest":"sha256:l1"}]}"#;
        assert_eq!(first_digest(manifest).as_deref(), Some("sha256:cfg"));
    }

    #[test]
    fn no_digest_field() {
        assert_eq!(first_digest(r#"{"schemaVersion": 2}"#), None);
        assert_eq!(first_digest("no such manifest"), None);
    }
}
