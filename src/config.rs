use crate::error::{DockcheckError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "dockcheck.toml";
const ENV_PREFIX: &str = "DOCKCHECK_";

/// Immutable run configuration, loaded once and passed to every component.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Master switch; when off a cycle only discovers and reports.
    pub check: bool,
    pub auto_update: bool,
    pub notify_only: bool,
    pub auto_prune: bool,
    pub force_recreate: bool,
    pub use_compose: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_file: Option<PathBuf>,
    pub include_stopped: bool,
    #[serde(deserialize_with = "string_or_list")]
    pub include: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub exclude: Vec<String>,
    /// `key=value` a container must carry to be considered.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_scalar"
    )]
    pub label_filter: Option<String>,
    /// Minimum container age, `N`, `Nd` or `Nw`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_scalar"
    )]
    pub min_age: Option<String>,
    /// Keep a backup tag of the replaced image for this many days; 0 disables.
    pub backup_days: u32,
    pub registry_timeout_secs: u64,
    pub check_concurrency: usize,
    pub docker_bin: String,
    pub regctl_bin: String,
    pub dry_run: bool,
    pub notify: NotifySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check: true,
            auto_update: false,
            notify_only: false,
            auto_prune: false,
            force_recreate: false,
            use_compose: false,
            compose_file: None,
            include_stopped: false,
            include: Vec::new(),
            exclude: Vec::new(),
            label_filter: None,
            min_age: None,
            backup_days: 0,
            registry_timeout_secs: 10,
            check_concurrency: 1,
            docker_bin: "docker".into(),
            regctl_bin: "regctl".into(),
            dry_run: false,
            notify: NotifySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotifySettings {
    /// Names of the channels to deliver to, e.g. `["ntfy", "discord"]`.
    #[serde(deserialize_with = "string_or_list")]
    pub channels: Vec<String>,
    /// Also notify when a cycle finds nothing to update.
    pub on_no_updates: bool,
    /// Per-channel settings, keyed by channel name (`[notify.ntfy]`, ...).
    #[serde(flatten)]
    pub channel_settings: BTreeMap<String, ChannelSettings>,
}

/// Union of the fields the built-in channels read; each uses what it needs.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChannelSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "optional_scalar")]
    pub chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Layers defaults, the TOML file and `DOCKCHECK_*` environment variables.
    ///
    /// An explicitly given file must exist; the implicit locations are optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        match explicit_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(DockcheckError::Config(format!(
                        "config file '{}' not found",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let settings: Settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| DockcheckError::Config(e.to_string()))?;

        Ok(settings)
    }

    /// First existing implicit config file: `./dockcheck.toml`, then the XDG location.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
        Self::user_config_path().filter(|p| p.is_file())
    }

    pub fn user_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("dockcheck").join(CONFIG_FILE_NAME))
    }

    /// Rejects combinations that can't produce a meaningful cycle.
    pub fn validate(&self) -> Result<()> {
        if self.use_compose && self.compose_file.is_none() {
            return Err(DockcheckError::Config(
                "use_compose requires compose_file".to_string(),
            ));
        }
        if self.registry_timeout_secs == 0 {
            return Err(DockcheckError::Config(
                "registry_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.check_concurrency == 0 {
            return Err(DockcheckError::Config(
                "check_concurrency must be at least 1".to_string(),
            ));
        }
        if self.auto_update && self.notify_only {
            return Err(DockcheckError::Config(
                "auto_update and notify_only are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// Writes a starter config file; never overwrites.
    pub fn write_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(DockcheckError::Config(format!(
                "'{}' already exists, refusing to overwrite",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut template = Settings::default();
        template.notify.channel_settings.insert(
            "ntfy".to_string(),
            ChannelSettings {
                url: Some("https://ntfy.sh".to_string()),
                topic: Some("dockcheck".to_string()),
                ..Default::default()
            },
        );
        let body = toml::to_string_pretty(&template)
            .map_err(|e| DockcheckError::Config(format!("failed to render template: {e}")))?;
        let content = format!(
            "# dockcheck configuration\n\
             # Every key can also be set through DOCKCHECK_<KEY> (nested: DOCKCHECK_NOTIFY__CHANNELS).\n\
             # Add channel names to notify.channels to enable notifications.\n\n{body}"
        );
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// Accepts `["a", "b"]` as well as `"a,b"` (the shape env vars arrive in).
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = StringOrList::deserialize(deserializer)?;
    let items = match raw {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect(),
        StringOrList::Many(v) => v,
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Env values like `DOCKCHECK_MIN_AGE=7` arrive as numbers; keep them as text.
fn optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Scalar>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| match s {
            Scalar::Text(t) => t,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
