// apkd-common/src/model/source.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

/// Where a catalog entry's candidate artifact comes from. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMethod {
    /// The locator is the download URL.
    Direct,
    /// The locator is a GitHub releases API endpoint.
    GithubRelease,
    /// The locator is a GitLab releases API endpoint.
    GitlabRelease,
    /// The locator is a shell command printing the download URL.
    Custom,
}

impl SourceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMethod::Direct => "direct",
            SourceMethod::GithubRelease => "github_release",
            SourceMethod::GitlabRelease => "gitlab_release",
            SourceMethod::Custom => "custom",
        }
    }

    pub fn needs_filter(&self) -> bool {
        matches!(self, SourceMethod::GithubRelease | SourceMethod::GitlabRelease)
    }
}

impl fmt::Display for SourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceMethod {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "direct" => Ok(SourceMethod::Direct),
            "github_release" => Ok(SourceMethod::GithubRelease),
            "gitlab_release" => Ok(SourceMethod::GitlabRelease),
            "custom" => Ok(SourceMethod::Custom),
            other => Err(ResolutionError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub method: SourceMethod,
    pub locator: String,
    /// Asset-name regex for release sources; ignored for `Direct`. For
    /// `Custom` the whole command lives in `locator`.
    pub filter: Option<String>,
}

impl SourceDescriptor {
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            method: SourceMethod::Direct,
            locator: url.into(),
            filter: None,
        }
    }

    /// Non-empty filter, or `MissingFilter` for release methods.
    pub fn required_filter(&self) -> Result<&str, ResolutionError> {
        match self.filter.as_deref().map(str::trim) {
            Some(f) if !f.is_empty() => Ok(f),
            _ => Err(ResolutionError::MissingFilter(self.method.to_string())),
        }
    }
}
