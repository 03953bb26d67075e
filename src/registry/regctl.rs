use crate::error::{DockcheckError, Result};
use crate::registry::{looks_like_digest, DigestSource, ImageReference};
use crate::utils::process;
use std::time::Duration;

/// Primary digest source backed by the `regctl` registry client.
///
/// `--list` makes regctl return the manifest-list digest for multi-arch
/// images, which is what `docker pull` records in RepoDigests.
pub struct RegctlSource {
    binary: String,
}

impl RegctlSource {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl DigestSource for RegctlSource {
    fn name(&self) -> &str {
        "regctl"
    }

    fn fetch_digest(&self, reference: &ImageReference, timeout: Duration) -> Result<String> {
        let image = reference.to_string();
        let args = ["-v", "error", "image", "digest", "--list", image.as_str()];

        let output = process::run(&self.binary, &args, Some(timeout)).map_err(|e| match e {
            DockcheckError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                DockcheckError::CommandFailed {
                    command: self.binary.clone(),
                    stderr: "binary not found in PATH".to_string(),
                }
            }
            other => other,
        })?;
        process::ensure_success(&output, &process::describe(&self.binary, &args))?;

        parse_digest_output(&output.stdout).ok_or_else(|| DockcheckError::DigestUnresolvable {
            reference: image,
            reason: "regctl returned no digest".to_string(),
        })
    }
}

/// First line of the output that is a digest.
pub fn parse_digest_output(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| looks_like_digest(line))
        .map(str::to_string)
}
