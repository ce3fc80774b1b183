// apkd-common/src/model/mod.rs
pub mod catalog;
pub mod source;

// Re-export
pub use catalog::{canonical_filename_from_url, validate_filename, AppRecord, Catalog};
pub use source::{SourceDescriptor, SourceMethod};
