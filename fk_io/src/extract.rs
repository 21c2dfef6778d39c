//! Source archive extraction.

use std::fs;
use std::path::{Path, PathBuf};

use fk_core::Error;

/// Extract a source archive into `dest`, picking the decompressor from the
/// file extension (`.tar.gz`/`.tgz` or `.tar.xz`). Returns the source root:
/// the single top-level directory when the archive has one (the usual
/// `name-version/` layout), otherwise `dest` itself.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<PathBuf, Error> {
    fs::create_dir_all(dest).map_err(|e| extract_error(archive, e))?;

    let file = fs::File::open(archive).map_err(|e| extract_error(archive, e))?;
    let name = archive.to_string_lossy();

    if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        let decoder = xz2::read::XzDecoder::new(file);
        tar::Archive::new(decoder)
            .unpack(dest)
            .map_err(|e| extract_error(archive, e))?;
    } else {
        let decoder = flate2::read::GzDecoder::new(file);
        tar::Archive::new(decoder)
            .unpack(dest)
            .map_err(|e| extract_error(archive, e))?;
    }

    let entries: Vec<_> = fs::read_dir(dest)
        .map_err(|e| extract_error(archive, e))?
        .filter_map(|e| e.ok())
        .collect();

    if entries.len() == 1 && entries[0].path().is_dir() {
        Ok(entries[0].path())
    } else {
        Ok(dest.to_path_buf())
    }
}

fn extract_error(archive: &Path, e: impl std::fmt::Display) -> Error {
    Error::BuildStepFailure {
        step: format!("extract {}", archive.display()),
        exit_code: None,
        output: e.to_string(),
    }
}
