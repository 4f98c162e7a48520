// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory tree ⇄ gzip-compressed tar archive.
//!
//! Both directions stage the archive in a temp file that is removed when
//! the operation finishes. Entries are appended in sorted order with
//! normalized headers, so packing unchanged content yields the same bytes.
//! These functions block; async callers run them on the blocking pool.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors from packing or unpacking an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("directory not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("corrupt archive: {0}")]
    Corrupt(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Pack the full recursive contents of `dir` into a single archive blob.
///
/// Paths inside the archive are relative to `dir`.
pub fn pack(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(ArchiveError::NotFound(dir.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArchiveError::NotFound(dir.to_path_buf()))
        }
        Err(e) => return Err(ArchiveError::Io(e)),
    }

    let mut staged = tempfile::NamedTempFile::new()?;
    {
        let encoder = GzEncoder::new(staged.as_file_mut(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        builder.mode(tar::HeaderMode::Deterministic);
        append_tree(&mut builder, dir, Path::new(""))?;
        let encoder = builder.into_inner()?;
        encoder.finish()?;
    }

    let bytes = std::fs::read(staged.path())?;
    tracing::debug!(dir = %dir.display(), size_bytes = bytes.len(), "packed directory");
    Ok(bytes)
}

/// Extract `blob` into `dest`, creating it (and parents) if absent.
///
/// Existing files at matching paths are overwritten; other files in
/// `dest` are left alone. The blob is fully validated before anything is
/// written, so a corrupt archive never leaves a half-extracted tree.
pub fn unpack(blob: &[u8], dest: &Path) -> Result<(), ArchiveError> {
    if blob.len() < GZIP_MAGIC.len() || blob[..2] != GZIP_MAGIC {
        return Err(ArchiveError::Corrupt("missing gzip header".to_string()));
    }

    let mut staged = tempfile::NamedTempFile::new()?;
    staged.write_all(blob)?;
    staged.flush()?;

    validate(staged.as_file_mut())?;

    std::fs::create_dir_all(dest)?;
    let file = staged.as_file_mut();
    file.seek(SeekFrom::Start(0))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_overwrite(true);
    archive.set_preserve_permissions(true);
    archive.unpack(dest)?;

    tracing::debug!(dest = %dest.display(), size_bytes = blob.len(), "unpacked archive");
    Ok(())
}

/// Decode every entry without writing anything.
fn validate(file: &mut File) -> Result<(), ArchiveError> {
    let corrupt = |e: io::Error| ArchiveError::Corrupt(e.to_string());

    file.seek(SeekFrom::Start(0))?;
    let mut archive = tar::Archive::new(GzDecoder::new(&mut *file));
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        io::copy(&mut entry, &mut io::sink()).map_err(corrupt)?;
    }
    Ok(())
}

/// Append `root/rel` recursively, children in name order.
fn append_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    rel: &Path,
) -> io::Result<()> {
    let mut entries = std::fs::read_dir(root.join(rel))?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let rel_path = rel.join(entry.file_name());
        let full_path = entry.path();
        if entry.file_type()?.is_dir() {
            builder.append_dir(&rel_path, &full_path)?;
            append_tree(builder, root, &rel_path)?;
        } else {
            builder.append_path_with_name(&full_path, &rel_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
