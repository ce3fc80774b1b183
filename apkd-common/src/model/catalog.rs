// apkd-common/src/model/catalog.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::source::{SourceDescriptor, SourceMethod};
use crate::error::{ApkdError, ResolutionError, Result};

const MANUAL_METHOD: &str = "manual";
const RESERVED_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// The whole catalog file. Unknown top-level keys survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub apps: Vec<AppRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Catalog {
    pub fn get(&self, index: usize) -> Option<&AppRecord> {
        self.apps.get(index)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Index of the first entry whose title equals `title`, ignoring case.
    pub fn position_by_title(&self, title: &str) -> Option<usize> {
        self.apps
            .iter()
            .position(|app| app.title.eq_ignore_ascii_case(title))
    }
}

/// One application entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, rename = "app_review", skip_serializing_if = "Option::is_none")]
    pub app_review: Option<Value>,
    /// Public download URL; its last path segment is the canonical filename.
    #[serde(
        default,
        rename = "url",
        alias = "downloadUrl",
        skip_serializing_if = "String::is_empty"
    )]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_filter: Option<String>,
    #[serde(default, rename = "ver", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppRecord {
    /// The on-disk artifact name, taken from the last segment of
    /// `download_url` and never from the source locator.
    pub fn canonical_filename(&self) -> Result<String> {
        canonical_filename_from_url(&self.download_url)
    }

    /// `None` when the entry has no automatic source (manual-only entries).
    pub fn source(&self) -> Option<std::result::Result<SourceDescriptor, ResolutionError>> {
        let locator = self
            .source_update
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        let raw_method = self.source_method.as_deref().unwrap_or("direct");
        if raw_method.trim().eq_ignore_ascii_case(MANUAL_METHOD) {
            return None;
        }
        Some(raw_method.parse::<SourceMethod>().map(|method| SourceDescriptor {
            method,
            locator: locator.to_string(),
            filter: self.source_filter.clone(),
        }))
    }

    pub fn version_or_unknown(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(crate::version::UNKNOWN_VERSION)
    }
}

pub fn canonical_filename_from_url(download_url: &str) -> Result<String> {
    let without_fragment = download_url.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();
    let name = without_query
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    validate_filename(&name)?;
    Ok(name)
}

/// Rejects names that could escape the artifact directory or that are not
/// portable file names.
pub fn validate_filename(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(ApkdError::InvalidFilename(
            name.to_string(),
            reason.to_string(),
        ))
    };
    if name.trim().is_empty() {
        return invalid("empty filename");
    }
    if name == "." || name.contains("..") {
        return invalid("path traversal");
    }
    if let Some(c) = name.chars().find(|c| RESERVED_FILENAME_CHARS.contains(c)) {
        return invalid(&format!("reserved character '{c}'"));
    }
    if name.chars().any(char::is_control) {
        return invalid("control character");
    }
    Ok(())
}
