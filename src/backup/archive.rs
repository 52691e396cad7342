// backuptool/src/backup/archive.rs
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::errors::{BackupError, Result};

/// Every shipped archive is a deflate-compressed zip container.
pub const ARCHIVE_SUFFIX: &str = ".zip";

fn entry_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
        // Dumps are unbounded; zip64 keeps >4 GiB entries representable.
        .large_file(true)
}

/// Wraps a single raw file into a single-entry zip archive at
/// `source_path + ".zip"`. The entry is named after the source file and
/// its contents are streamed, never held in memory.
///
/// Returns the path of the created archive.
pub fn compress_file(source_path: &Path) -> Result<PathBuf> {
    let entry_name = source_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            BackupError::Compression(format!(
                "Source path has no usable file name: {}",
                source_path.display()
            ))
        })?
        .to_string();

    let mut source = File::open(source_path).map_err(|e| {
        BackupError::Compression(format!(
            "Failed to open source file {}: {}",
            source_path.display(),
            e
        ))
    })?;

    let mut zip_path = source_path.as_os_str().to_owned();
    zip_path.push(ARCHIVE_SUFFIX);
    let zip_path = PathBuf::from(zip_path);

    let archive_file = File::create(&zip_path).map_err(|e| {
        BackupError::Compression(format!(
            "Failed to create archive file {}: {}",
            zip_path.display(),
            e
        ))
    })?;

    let mut zip = ZipWriter::new(archive_file);
    zip.start_file(&entry_name, entry_options())
        .map_err(|e| BackupError::Compression(format!("Failed to add entry {}: {}", entry_name, e)))?;
    io::copy(&mut source, &mut zip).map_err(|e| {
        BackupError::Compression(format!(
            "Failed to write {} into archive: {}",
            source_path.display(),
            e
        ))
    })?;
    zip.finish()
        .map_err(|e| BackupError::Compression(format!("Failed to finalize archive {}: {}", zip_path.display(), e)))?;

    verify_archive_exists(&zip_path)?;
    Ok(zip_path)
}

/// Packages all regular files under `source_dir` into a deflate zip at
/// `dest_zip_path`, entry paths relative to `source_dir`. Read-only scan
/// of the source tree; file contents are streamed entry by entry.
///
/// A missing source directory is `SourceNotFound`: no archive file is
/// created and the caller is expected to skip the unit.
pub fn archive_directory(source_dir: &Path, dest_zip_path: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        return Err(BackupError::SourceNotFound(source_dir.to_path_buf()));
    }

    let archive_file = File::create(dest_zip_path).map_err(|e| {
        BackupError::Compression(format!(
            "Failed to create archive file {}: {}",
            dest_zip_path.display(),
            e
        ))
    })?;
    let mut zip = ZipWriter::new(archive_file);

    for entry in WalkDir::new(source_dir) {
        let entry = entry.map_err(|e| {
            BackupError::Compression(format!(
                "Failed to walk directory {}: {}",
                source_dir.display(),
                e
            ))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = path
            .strip_prefix(source_dir)
            .map_err(|e| {
                BackupError::Compression(format!(
                    "Failed to strip prefix {} from {}: {}",
                    source_dir.display(),
                    path.display(),
                    e
                ))
            })?
            .to_string_lossy()
            .into_owned();

        let mut source = File::open(path).map_err(|e| {
            BackupError::Compression(format!("Failed to open {}: {}", path.display(), e))
        })?;
        zip.start_file(&name, entry_options())
            .map_err(|e| BackupError::Compression(format!("Failed to add entry {}: {}", name, e)))?;
        io::copy(&mut source, &mut zip).map_err(|e| {
            BackupError::Compression(format!(
                "Failed to write {} into archive: {}",
                path.display(),
                e
            ))
        })?;
    }

    zip.finish().map_err(|e| {
        BackupError::Compression(format!(
            "Failed to finalize archive {}: {}",
            dest_zip_path.display(),
            e
        ))
    })?;

    verify_archive_exists(dest_zip_path)
}

/// An archive writer that reports success but leaves no file on disk is a
/// failure condition, not a success.
fn verify_archive_exists(zip_path: &Path) -> Result<()> {
    if zip_path.is_file() {
        Ok(())
    } else {
        Err(BackupError::CompressionVerification(zip_path.to_path_buf()))
    }
}
