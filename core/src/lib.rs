pub mod auth;
pub mod client;
pub mod config;
pub mod entry;
pub mod security;
pub mod snapshot;
pub mod types;

// Folder detection follows the remote store mime type convention
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
