//! Error taxonomy shared by the repository, the platform client and the engine.

use std::fmt;

use thiserror::Error;

/// Any failed persistence call. Callers only learn that storage failed; the
/// underlying `sqlx` error is kept as the source for the operator log.
#[derive(Debug, Error)]
#[error("storage internal error")]
pub struct StorageError {
    #[source]
    source: sqlx::Error,
}

impl From<sqlx::Error> for StorageError {
    fn from(source: sqlx::Error) -> Self {
        Self { source }
    }
}

impl StorageError {
    /// Full detail for logging. Never shown to users.
    pub fn detail(&self) -> String {
        self.source.to_string()
    }
}

/// Any failed platform call.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The referenced platform object no longer exists.
    #[error("platform object not found")]
    NotFound,

    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Why a lifecycle transition or command was aborted.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LifecycleError {
    /// Static label used as the `error_kind` log field.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Platform(_) => "platform",
            Self::Storage(_) => "storage",
        }
    }
}

/// A detected divergence between platform state and persisted state.
///
/// Gaps are never corrected silently; they are reported through the log so an
/// operator can reconcile by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationGap {
    /// The external channel exists but its record could not be written and the
    /// compensating delete also failed.
    UntrackedChannel,
    /// The record was removed from the store's point of view but the external
    /// channel could not be deleted.
    UndeletedChannel,
    /// The external channel is gone but its record could not be deleted.
    StaleRecord,
    /// A leave would have taken the occupant count below zero.
    CountUnderflow,
}

impl ReconciliationGap {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UntrackedChannel => "untracked_channel",
            Self::UndeletedChannel => "undeleted_channel",
            Self::StaleRecord => "stale_record",
            Self::CountUnderflow => "count_underflow",
        }
    }
}

impl fmt::Display for ReconciliationGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
