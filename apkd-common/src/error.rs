use std::sync::Arc;

use thiserror::Error;

/// Why a source descriptor could not be turned into a download URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("sourceFilter is required for {0} sources")]
    MissingFilter(String),

    #[error("no release asset matches filter '{0}'")]
    NoMatchingAsset(String),

    #[error("release API unavailable: {0}")]
    ApiUnavailable(String),

    #[error("custom command failed: {0}")]
    CustomCommandFailed(String),

    #[error("unknown sourceMethod '{0}'")]
    UnknownMethod(String),

    #[error("invalid sourceFilter '{0}': {1}")]
    InvalidFilter(String, String),

    #[error("invalid download URL '{0}': {1}")]
    InvalidUrl(String, String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("download from '{0}' failed: {1}")]
    Unreachable(String, String),

    #[error("download from '{0}' returned no content")]
    Empty(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromoteError {
    #[error("cannot write artifact '{0}': {1}")]
    WriteDenied(String, String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    #[error("cannot write catalog: {0}")]
    WriteDenied(String),

    #[error("catalog entry #{0} ('{1}') is no longer present")]
    MissingEntry(usize, String),
}

#[derive(Error, Debug, Clone)]
pub enum ApkdError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Resolution Error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Fetch Error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Promote Error: {0}")]
    Promote(#[from] PromoteError),

    #[error("Commit Error: {0}")]
    Commit(#[from] CommitError),

    #[error("Catalog unreadable at {0}: {1}")]
    CatalogUnreadable(String, String),

    #[error("Catalog malformed at {0}: {1}")]
    CatalogMalformed(String, String),

    #[error("Version inspection tool not found: {0}")]
    ToolMissing(String),

    #[error("Invalid artifact filename '{0}': {1}")]
    InvalidFilename(String, String),

    #[error("Submitter {0} is not permitted to upload artifacts")]
    NotAuthorized(i64),

    #[error("Submitted file matches {0} catalog entries")]
    AmbiguousMatch(usize),

    #[error("Submitted file matches no catalog entry")]
    NoMatch,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("No pending decision with id {0}")]
    PendingNotFound(String),

    #[error("A reconciliation pass is already running")]
    PassInProgress,

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl ApkdError {
    /// Short reason suitable for the operator channel. Never contains the
    /// underlying error chain.
    pub fn operator_reason(&self) -> &'static str {
        match self {
            ApkdError::Resolution(ResolutionError::NoMatchingAsset(_)) => "asset not found",
            ApkdError::Resolution(ResolutionError::MissingFilter(_))
            | ApkdError::Resolution(ResolutionError::InvalidFilter(..)) => "source filter invalid",
            ApkdError::Resolution(ResolutionError::ApiUnavailable(_)) => "release API unavailable",
            ApkdError::Resolution(ResolutionError::CustomCommandFailed(_)) => {
                "custom source command failed"
            }
            ApkdError::Resolution(ResolutionError::UnknownMethod(_)) => "unknown source method",
            ApkdError::Resolution(ResolutionError::InvalidUrl(..)) => "download URL invalid",
            ApkdError::Fetch(FetchError::Unreachable(..)) => "download failed",
            ApkdError::Fetch(FetchError::Empty(_)) => "downloaded file is empty",
            ApkdError::Promote(_) | ApkdError::Commit(CommitError::WriteDenied(_)) => {
                "write denied"
            }
            ApkdError::Commit(CommitError::MissingEntry(..)) => "catalog entry disappeared",
            ApkdError::NotAuthorized(_) => "not permitted",
            ApkdError::AmbiguousMatch(_) => "several apps match",
            ApkdError::NoMatch => "no app matches",
            ApkdError::InvalidSelection(_) => "invalid selection",
            ApkdError::PendingNotFound(_) => "upload expired, send it again",
            ApkdError::InvalidFilename(..) => "catalog entry misconfigured",
            ApkdError::CatalogUnreadable(..) | ApkdError::CatalogMalformed(..) => {
                "catalog unavailable"
            }
            ApkdError::ToolMissing(_) => "version tool missing",
            ApkdError::PassInProgress => "update already running",
            _ => "internal error",
        }
    }

    /// Errors that end a reconciliation pass: nothing further can be
    /// checked or recorded while they hold.
    pub fn is_fatal_for_pass(&self) -> bool {
        matches!(
            self,
            ApkdError::CatalogUnreadable(..)
                | ApkdError::CatalogMalformed(..)
                | ApkdError::ToolMissing(_)
        )
    }
}

impl From<std::io::Error> for ApkdError {
    fn from(err: std::io::Error) -> Self {
        ApkdError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for ApkdError {
    fn from(err: reqwest::Error) -> Self {
        ApkdError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for ApkdError {
    fn from(err: serde_json::Error) -> Self {
        ApkdError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ApkdError>;
