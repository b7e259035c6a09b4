//! Network acquisition: host API access and downloads.

pub mod download;
pub mod http;

pub use download::{DownloadRequest, Downloader};
pub use http::{HostingClient, Release, ReleaseAsset};
