use crate::error::{DockcheckError, Result};
use std::path::{Path, PathBuf};

const FORBIDDEN: &[&str] = &["/sys", "/proc", "/dev", "/boot"];
const DANGEROUS: &[char] = &[';', '|', '&', '$', '`', '\n', '\r'];

/// Safe path checks for compose manifests handed to `docker compose -f`.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises a compose manifest path.
    pub fn validate_manifest_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let path_str = path.to_string_lossy();
        if let Some(ch) = DANGEROUS.iter().find(|c| path_str.contains(**c)) {
            return Err(DockcheckError::InvalidPath(format!(
                "'{}' contains dangerous character '{}'",
                path.display(),
                ch
            )));
        }

        let canonical = path.canonicalize().map_err(|e| {
            DockcheckError::InvalidPath(format!("'{}': {e}", path.display()))
        })?;

        if !canonical.is_file() {
            return Err(DockcheckError::InvalidPath(format!(
                "'{}' is not a file",
                canonical.display()
            )));
        }

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);
            if canonical.starts_with(forbidden_path) {
                return Err(DockcheckError::InvalidPath(format!(
                    "manifests under '{}' are not allowed",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Builds the manifest paths recorded by compose in container labels.
    ///
    /// `config_files` holds every `-f` file the project was started with, comma
    /// separated and in order. Relative entries are resolved against `working_dir`.
    /// A partial set is never returned: one unresolvable entry empties the result.
    pub fn manifests_from_labels(
        working_dir: Option<&str>,
        config_files: Option<&str>,
    ) -> Vec<PathBuf> {
        let Some(config_files) = config_files else {
            return Vec::new();
        };
        let working_dir = working_dir.filter(|d| !d.is_empty());

        config_files
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|entry| {
                let file = Path::new(entry);
                if file.is_absolute() {
                    Some(file.to_path_buf())
                } else {
                    working_dir.map(|d| Path::new(d).join(file))
                }
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn accepts_existing_manifest() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("compose.yaml");
        fs::write(&manifest, "services: {}\n").unwrap();
        let validated = PathValidator::validate_manifest_path(&manifest).unwrap();
        assert!(validated.is_absolute());
    }

    #[test]
    fn rejects_directory() {
        let dir = tempdir().unwrap();
        let err = PathValidator::validate_manifest_path(dir.path()).unwrap_err();
        assert!(matches!(err, DockcheckError::InvalidPath(_)));
    }

    #[test]
    fn rejects_missing_file() {
        let dir = tempdir().unwrap();
        assert!(PathValidator::validate_manifest_path(dir.path().join("nope.yml")).is_err());
    }

    #[test]
    fn rejects_dangerous_characters() {
        let err = PathValidator::validate_manifest_path("/tmp/compose.yml;rm -rf").unwrap_err();
        assert!(matches!(err, DockcheckError::InvalidPath(_)));
    }

    #[test]
    fn manifests_from_labels_keeps_every_config_file() {
        let paths = PathValidator::manifests_from_labels(
            Some("/srv/app"),
            Some("docker-compose.yml, override.yml,/etc/stack/extra.yml"),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/srv/app/docker-compose.yml"),
                PathBuf::from("/srv/app/override.yml"),
                PathBuf::from("/etc/stack/extra.yml"),
            ]
        );

        let absolute = PathValidator::manifests_from_labels(None, Some("/opt/stack/compose.yaml"));
        assert_eq!(absolute, vec![PathBuf::from("/opt/stack/compose.yaml")]);

        assert!(PathValidator::manifests_from_labels(Some("/srv"), None).is_empty());
        assert!(PathValidator::manifests_from_labels(None, Some("compose.yml")).is_empty());
    }

    #[test]
    fn one_unresolvable_file_drops_the_whole_set() {
        let paths = PathValidator::manifests_from_labels(
            None,
            Some("/opt/stack/compose.yaml,override.yml"),
        );
        assert!(paths.is_empty());
    }
}
