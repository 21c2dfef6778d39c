use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fk_core::Error;

/// On-disk cache of downloaded source archives, keyed by declared SHA-256.
#[derive(Clone)]
pub struct SourceCache {
    archives_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl SourceCache {
    pub fn new(cache_root: &Path) -> io::Result<Self> {
        let archives_dir = cache_root.join("sources");
        let tmp_dir = cache_root.join("tmp");

        fs::create_dir_all(&archives_dir)?;
        fs::create_dir_all(&tmp_dir)?;

        Ok(Self {
            archives_dir,
            tmp_dir,
        })
    }

    /// The file name keeps the original archive name so the extractor can
    /// pick a decompressor from the extension.
    pub fn archive_path(&self, sha256: &str, file_name: &str) -> PathBuf {
        self.archives_dir.join(format!("{sha256}-{file_name}"))
    }

    pub fn has_archive(&self, sha256: &str, file_name: &str) -> bool {
        self.archive_path(sha256, file_name).exists()
    }

    /// Remove a cached archive (used when verification fails).
    pub fn remove_archive(&self, sha256: &str, file_name: &str) -> io::Result<bool> {
        let path = self.archive_path(sha256, file_name);
        if path.exists() {
            fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn start_write(&self, sha256: &str, file_name: &str) -> io::Result<CacheWriter> {
        let final_path = self.archive_path(sha256, file_name);
        // Unique temp filename to avoid corruption from racing downloads
        let unique_id = std::process::id();
        let tmp_path = self
            .tmp_dir
            .join(format!("{sha256}.{unique_id}.{file_name}.part"));

        let file = fs::File::create(&tmp_path)?;

        Ok(CacheWriter {
            file,
            tmp_path,
            final_path,
            committed: false,
        })
    }
}

/// In-flight download: writes to a temp file, atomically renamed on commit.
/// Dropped without commit, the partial file is removed.
pub struct CacheWriter {
    file: fs::File,
    tmp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl CacheWriter {
    pub fn commit(mut self) -> Result<PathBuf, Error> {
        self.file.flush().map_err(|e| Error::CacheFailure {
            message: format!("failed to flush archive: {e}"),
        })?;

        // Another racing download may have already created the final file.
        if self.final_path.exists() {
            let _ = fs::remove_file(&self.tmp_path);
            self.committed = true;
            return Ok(self.final_path.clone());
        }

        match fs::rename(&self.tmp_path, &self.final_path) {
            Ok(()) => {}
            Err(_e) if self.final_path.exists() => {
                let _ = fs::remove_file(&self.tmp_path);
            }
            Err(e) => {
                return Err(Error::CacheFailure {
                    message: format!("failed to rename archive: {e}"),
                });
            }
        }

        self.committed = true;
        Ok(self.final_path.clone())
    }
}

impl Write for CacheWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for CacheWriter {
    fn drop(&mut self) {
        if !self.committed && self.tmp_path.exists() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
