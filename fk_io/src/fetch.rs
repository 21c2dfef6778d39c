//! Source archive download and checksum verification.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use sha2::{Digest, Sha256};

use fk_core::{Error, FormulaSpec};

use crate::cache::SourceCache;
use crate::progress::{BuildProgress, ProgressCallback};

/// Streaming downloader for formula source archives.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Download the formula's source archive into the cache, streaming to
    /// disk and reporting byte progress as chunks arrive. Returns the cached
    /// path. A cache hit skips the network entirely; verification is the
    /// caller's job either way.
    pub async fn fetch(
        &self,
        spec: &FormulaSpec,
        cache: &SourceCache,
        progress: &ProgressCallback,
    ) -> Result<(PathBuf, bool), Error> {
        let file_name = spec.archive_file_name();

        if cache.has_archive(&spec.sha256, &file_name) {
            return Ok((cache.archive_path(&spec.sha256, &file_name), true));
        }

        let response = self
            .client
            .get(&spec.url)
            .send()
            .await
            .map_err(|e| Error::NetworkFailure {
                message: format!("failed to fetch {}: {}", spec.url, e),
            })?;

        if !response.status().is_success() {
            return Err(Error::NetworkFailure {
                message: format!("failed to fetch {}: HTTP {}", spec.url, response.status()),
            });
        }

        let total_bytes = response.content_length();
        progress(BuildProgress::DownloadStarted {
            formula: spec.name.clone(),
            url: spec.url.clone(),
            total_bytes,
        });

        let mut writer =
            cache
                .start_write(&spec.sha256, &file_name)
                .map_err(|e| Error::CacheFailure {
                    message: format!("failed to open cache file: {e}"),
                })?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::NetworkFailure {
                message: format!("failed to read response body: {e}"),
            })?;
            writer.write_all(&chunk).map_err(|e| Error::CacheFailure {
                message: format!("failed to write archive: {e}"),
            })?;
            downloaded += chunk.len() as u64;
            progress(BuildProgress::DownloadProgress {
                formula: spec.name.clone(),
                downloaded,
                total_bytes,
            });
        }

        let path = writer.commit()?;
        progress(BuildProgress::DownloadCompleted {
            formula: spec.name.clone(),
            total_bytes: downloaded,
        });
        Ok((path, false))
    }
}

/// Verify a cached archive against the formula's declared digest. Runs on
/// every install, cache hit or not, so a corrupted cache entry can never
/// reach the build. On mismatch the cached file is removed.
pub fn verify(spec: &FormulaSpec, cache: &SourceCache, path: &Path) -> Result<(), Error> {
    let actual = compute_sha256(path)?;
    if actual != spec.sha256 {
        let file_name = spec.archive_file_name();
        let _ = cache.remove_archive(&spec.sha256, &file_name);
        return Err(Error::ChecksumMismatch {
            expected: spec.sha256.clone(),
            actual,
            file_name: Some(file_name),
        });
    }
    Ok(())
}

/// SHA-256 hex digest of a file, computed in streaming fashion.
pub fn compute_sha256(path: &Path) -> Result<String, Error> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::CacheFailure {
        message: format!("failed to open {}: {}", path.display(), e),
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| Error::CacheFailure {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec_with(sha256: &str) -> FormulaSpec {
        FormulaSpec {
            name: "demo".to_string(),
            url: "https://example.com/demo-1.0.0.tar.gz".to_string(),
            sha256: sha256.to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn compute_sha256_of_known_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data");
        std::fs::write(&path, b"hello world").unwrap();

        // sha256("hello world")
        assert_eq!(
            compute_sha256(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn unreadable_cached_file_is_a_cache_failure_not_network() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("no-such-archive.tar.gz");

        let err = compute_sha256(&missing).unwrap_err();
        match err {
            Error::CacheFailure { message } => {
                assert!(message.contains("no-such-archive"));
            }
            other => panic!("expected CacheFailure, got {:?}", other),
        }
    }

    #[test]
    fn verify_accepts_matching_digest() {
        let tmp = TempDir::new().unwrap();
        let cache = SourceCache::new(tmp.path()).unwrap();
        let digest = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        let spec = spec_with(digest);

        let mut writer = cache.start_write(digest, &spec.archive_file_name()).unwrap();
        writer.write_all(b"hello world").unwrap();
        let path = writer.commit().unwrap();

        assert!(verify(&spec, &cache, &path).is_ok());
        // Verification does not consume the cache entry.
        assert!(cache.has_archive(digest, &spec.archive_file_name()));
    }

    #[test]
    fn verify_rejects_and_evicts_on_mismatch() {
        let tmp = TempDir::new().unwrap();
        let cache = SourceCache::new(tmp.path()).unwrap();
        let declared = "0".repeat(64);
        let spec = spec_with(&declared);

        let mut writer = cache
            .start_write(&declared, &spec.archive_file_name())
            .unwrap();
        writer.write_all(b"tampered bytes").unwrap();
        let path = writer.commit().unwrap();

        let err = verify(&spec, &cache, &path).unwrap_err();
        match err {
            Error::ChecksumMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, declared);
                assert_ne!(actual, declared);
            }
            other => panic!("expected ChecksumMismatch, got {:?}", other),
        }
        // The corrupted entry must not survive for the next run.
        assert!(!cache.has_archive(&declared, &spec.archive_file_name()));
    }
}
