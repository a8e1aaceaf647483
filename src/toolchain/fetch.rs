//! Idempotent toolchain archive download and extraction.
//!
//! Re-running a job is always safe:
//! - marker present: nothing happens
//! - archive present, marker absent: extraction only
//! - archive absent: download, then extraction
//!
//! Downloads stream into a temporary file next to the archive and are renamed
//! into place only once the transfer finished, so a failed transfer never
//! leaves a truncated archive behind.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::error::FetchError;
use crate::models::{ArchiveJob, FetchOutcome};
use crate::toolchain::archive::{ArchiveExtractor, Extractor};

/// Seam for the download stage.
pub trait Transport {
    /// Stream the resource at `url` into `out`, returning the byte count.
    fn download(&self, url: &str, out: &mut dyn Write) -> Result<u64, FetchError>;
}

/// HTTP(S) transport backed by a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("wasi-prep/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            // No overall deadline: toolchain archives are large
            .timeout(None)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str, out: &mut dyn Write) -> Result<u64, FetchError> {
        let transport_err = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut response = self.client.get(url).send().map_err(transport_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.copy_to(out).map_err(transport_err)
    }
}

/// Fetcher wired to explicit transport and extractor implementations.
pub struct Fetcher<T: Transport, E: Extractor> {
    transport: T,
    extractor: E,
}

impl Fetcher<HttpTransport, ArchiveExtractor> {
    /// Production fetcher: HTTP download plus on-disk archive extraction
    pub fn http() -> Result<Self, FetchError> {
        Ok(Fetcher::new(HttpTransport::new()?, ArchiveExtractor))
    }
}

impl<T: Transport, E: Extractor> Fetcher<T, E> {
    pub fn new(transport: T, extractor: E) -> Self {
        Fetcher {
            transport,
            extractor,
        }
    }

    /// Run one job to completion or fail on the first error.
    pub fn fetch_and_extract(&self, job: &ArchiveJob) -> Result<FetchOutcome, FetchError> {
        if job.expected_marker.exists() {
            log::info!(
                "[Fetch] Skipped (found {})",
                job.expected_marker.display()
            );
            return Ok(FetchOutcome::AlreadyExtracted);
        }

        let downloaded = if job.archive_path.exists() {
            log::info!(
                "[Fetch] Archive already present: {}",
                job.archive_path.display()
            );
            None
        } else {
            Some(self.download_to(&job.url, &job.archive_path)?)
        };

        let format = self.extractor.extract(&job.archive_path, &job.dest_dir)?;

        if !job.expected_marker.exists() {
            log::warn!(
                "[Fetch] Extraction finished but {} still does not exist; the next run will extract again",
                job.expected_marker.display()
            );
        }

        Ok(FetchOutcome::Extracted { downloaded, format })
    }

    fn download_to(&self, url: &str, archive: &Path) -> Result<u64, FetchError> {
        let parent = match archive.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        fs::create_dir_all(&parent).map_err(|e| FetchError::io(&parent, e))?;

        log::info!("[Fetch] Downloading {} -> {}", url, archive.display());

        let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| FetchError::io(&parent, e))?;
        let bytes = self.transport.download(url, tmp.as_file_mut())?;
        tmp.as_file_mut()
            .flush()
            .map_err(|e| FetchError::io(archive, e))?;
        tmp.persist(archive)
            .map_err(|e| FetchError::io(archive, e.error))?;

        log::info!("[Fetch] Downloaded {} bytes", bytes);
        Ok(bytes)
    }
}

/// Fetch and extract with the production HTTP transport and extractor.
pub fn fetch_and_extract(
    url: &str,
    archive_path: &Path,
    dest_dir: &Path,
    expected_marker: &Path,
) -> Result<FetchOutcome, FetchError> {
    let job = ArchiveJob {
        url: url.to_string(),
        archive_path: archive_path.to_path_buf(),
        dest_dir: dest_dir.to_path_buf(),
        expected_marker: expected_marker.to_path_buf(),
    };
    // Skip client construction entirely when there is nothing to do
    if job.expected_marker.exists() {
        log::info!("[Fetch] Skipped (found {})", job.expected_marker.display());
        return Ok(FetchOutcome::AlreadyExtracted);
    }
    Fetcher::http()?.fetch_and_extract(&job)
}
