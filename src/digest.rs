//! Local/remote content identity comparison.
//!
//! `local` is whatever the identity resolver produced for the running
//! container: usually a serialized list of repo-digests such as
//! `[docker.io/acme/app@sha256:…]`, or the bare image id for images that were
//! never pulled. `remote` is the single digest the registry reports for the
//! tag. The two are compared by containment: the image is current when the
//! remote digest appears verbatim inside the local identity.

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestPair {
    pub local: String,
    pub remote: String,
}

impl DigestPair {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn has_update(&self) -> bool {
        has_update(self)
    }
}

/// True unless the remote digest is provably present in the local identity.
///
/// Missing data on either side counts as "update available": we can't claim a
/// container is current without both identities.
pub fn has_update(pair: &DigestPair) -> bool {
    let local = pair.local.trim();
    let remote = pair.remote.trim();
    if local.is_empty() || remote.is_empty() {
        return true;
    }
    !local.contains(remote)
}

/// Serializes repo-digests the way the runtime prints them: `[a b c]`.
pub fn serialize_repo_digests(digests: &[String]) -> String {
    format!("[{}]", digests.join(" "))
}
