// apkd-net/src/lib.rs
pub mod http;
pub mod releases;
pub mod telegram;
pub mod validation;

pub use http::{build_http_client, download_to_file, download_to_file_as, get_json};
pub use releases::{fetch_release_assets, ReleaseAsset, ReleaseHost};
pub use telegram::TelegramClient;
pub use validation::validate_url;
