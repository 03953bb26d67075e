use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockcheckError {
    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Could not resolve digest for {reference}: {reason}")]
    DigestUnresolvable { reference: String, reason: String },

    #[error("Invalid image reference '{0}'")]
    InvalidReference(String),

    #[error("Command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Command '{command}' timed out after {seconds}s")]
    CommandTimeout { command: String, seconds: u64 },

    #[error("Backup of {container} failed: {reason}")]
    BackupFailed { container: String, reason: String },

    #[error("Update of {container} failed: {reason}")]
    UpdateFailed { container: String, reason: String },

    #[error(
        "{container} is not compose-managed; image {image} was pulled but the container \
         must be recreated manually with its original run options"
    )]
    StandaloneUpdateUnsupported { container: String, image: String },

    #[error("Notification channel '{channel}' failed: {reason}")]
    NotificationChannelFailed { channel: String, reason: String },

    #[error("All {0} notification channel(s) failed")]
    AllChannelsFailed(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Run interrupted")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DockcheckError {
    /// Errors that abort the whole run instead of skipping one unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DockcheckError::RuntimeUnavailable(_) | DockcheckError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DockcheckError>;
