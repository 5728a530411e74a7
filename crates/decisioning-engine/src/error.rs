use decisioning_core::{messages, FetchError, ValidationError};
use decisioning_settings::SettingsError;

/// Stable classification of [`EngineError`] for callers that branch on kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ArtifactUnavailable,
    VersionUnsupported,
    ContextUndefined,
    Validation,
    Stopped,
    Initialization,
    Settings,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No artifact has ever been held.
    #[error("{}", messages::ARTIFACT_NOT_AVAILABLE)]
    ArtifactUnavailable,

    #[error("{}", messages::artifact_version_unsupported(version, *supported))]
    VersionUnsupported { version: String, supported: u64 },

    #[error("{}", messages::CONTEXT_UNDEFINED)]
    ContextUndefined,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", messages::ENGINE_STOPPED)]
    Stopped,

    /// The first artifact could not be obtained.
    #[error(transparent)]
    Initialization(#[from] FetchError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArtifactUnavailable => ErrorKind::ArtifactUnavailable,
            Self::VersionUnsupported { .. } => ErrorKind::VersionUnsupported,
            Self::ContextUndefined => ErrorKind::ContextUndefined,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Stopped => ErrorKind::Stopped,
            Self::Initialization(_) => ErrorKind::Initialization,
            Self::Settings(_) => ErrorKind::Settings,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
