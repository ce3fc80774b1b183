// apkd-common/src/notify.rs
/// Side-channel messages emitted by the update paths. Rendering them as
/// text is the front end's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// First artifact ever stored for an entry.
    Added { title: String, version: String },
    /// Artifact replaced; `from == to` for a rebuild.
    Updated {
        title: String,
        from: String,
        to: String,
    },
    /// An entry could not be updated. `reason` is the short operator text.
    Failed { title: String, reason: String },
    /// End of a pass that changed at least one entry.
    PassSummary { updated: usize },
}

impl Notification {
    pub fn failed(title: &str, err: &crate::error::ApkdError) -> Self {
        Notification::Failed {
            title: title.to_string(),
            reason: err.operator_reason().to_string(),
        }
    }
}
