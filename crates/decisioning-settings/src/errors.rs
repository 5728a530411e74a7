//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The merged document does not fit [`DecisioningSettings`](crate::DecisioningSettings).
    #[error("settings have an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
    /// A required engine option is empty.
    #[error("{0}")]
    Required(&'static str),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use decisioning_core::messages;

    #[test]
    fn file_errors_name_the_path() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/decisioning.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "cannot read settings file /etc/decisioning.json: denied"
        );
    }

    #[test]
    fn required_option_uses_stable_message() {
        let err = SettingsError::Required(messages::CLIENT_REQUIRED);
        assert_eq!(err.to_string(), "Client is required");
    }
}
