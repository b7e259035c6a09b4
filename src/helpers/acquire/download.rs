//! Streaming downloads with bounded retry
//!
//! A failed attempt (transport error, non-2xx status, short write) waits a
//! fixed interval and tries again, up to `max_attempts` in total. Each
//! attempt truncates the destination, so a late success never leaves a
//! second copy behind.

use crate::core::error::{DependError, Result};
use crate::core::output;
use crate::helpers::acquire::http::HostingClient;
use crate::helpers::internal::fs_utils;
use crate::helpers::internal::progress::{self, ProgressGuard, upgrade_to_bytes};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Attempts per download, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Pause between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// A download request: where from, what to call it locally, and whether the
/// host should see the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest<'a> {
    pub url: &'a str,
    pub filename: &'a str,
    pub authenticated: bool,
}

#[derive(Debug, Clone)]
pub struct Downloader<'a> {
    client: &'a HostingClient,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a HostingClient) -> Self {
        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Download `request.url` into `dest_dir/request.filename`.
    ///
    /// Returns the written path. Fails with `Transport` once every attempt is
    /// spent, or if the final file is empty.
    pub fn fetch(&self, request: &DownloadRequest<'_>, dest_dir: &Path) -> Result<PathBuf> {
        let dest = dest_dir.join(request.filename);
        fs_utils::ensure_parent_dir(&dest)?;

        if request.authenticated
            && let Some(token) = self.client.token()
        {
            output::detail(&format!("using token {}", output::mask_token(token)));
        }

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.attempt(request, &dest) {
                Ok(bytes) => {
                    output::detail(&format!("downloaded {} ({} bytes)", request.filename, bytes));
                    last_error = None;
                    break;
                }
                Err(e) => {
                    if attempt < self.max_attempts {
                        output::warning(&format!(
                            "attempt {}/{} failed: {}; retrying in {}s",
                            attempt,
                            self.max_attempts,
                            e,
                            self.retry_delay.as_secs()
                        ));
                        std::thread::sleep(self.retry_delay);
                    }
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            let _ = std::fs::remove_file(&dest);
            return Err(DependError::transport(
                request.url,
                format!("giving up after {} attempts: {}", self.max_attempts, e),
            ));
        }

        let size = std::fs::metadata(&dest)
            .map_err(|e| DependError::fs(&dest, e))?
            .len();
        if size == 0 {
            let _ = std::fs::remove_file(&dest);
            return Err(DependError::transport(request.url, "downloaded file is empty"));
        }

        Ok(dest)
    }

    /// One download attempt with a progress bar.
    fn attempt(&self, request: &DownloadRequest<'_>, dest: &Path) -> Result<u64> {
        let pb = progress::create_spinner(&format!("downloading {}", request.filename));
        let _guard = ProgressGuard::new(&pb);

        let response = self.client.get(request.url, request.authenticated)?;

        let expected: Option<u64> = response
            .header("content-length")
            .and_then(|s| s.parse().ok());
        if let Some(len) = expected {
            upgrade_to_bytes(&pb, len);
        }

        let mut file = std::fs::File::create(dest).map_err(|e| DependError::fs(dest, e))?;
        let mut reader = response.into_reader();
        let mut buffer = [0u8; 8192];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .map_err(|e| DependError::transport(request.url, format!("read error: {}", e)))?;
            if bytes_read == 0 {
                break;
            }
            file.write_all(&buffer[..bytes_read])
                .map_err(|e| DependError::fs(dest, e))?;
            total_bytes += bytes_read as u64;
            pb.set_position(total_bytes);
        }

        if let Some(len) = expected
            && len != total_bytes
        {
            return Err(DependError::transport(
                request.url,
                format!("short read: expected {} bytes, got {}", len, total_bytes),
            ));
        }

        Ok(total_bytes)
    }
}
