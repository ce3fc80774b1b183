// apkd-common/src/lib.rs
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod version;

// Re-export key types
pub use config::Config;
pub use error::{ApkdError, Result};
pub use model::{AppRecord, Catalog, SourceDescriptor, SourceMethod};
pub use notify::Notification;
