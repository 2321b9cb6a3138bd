//! File payload helpers for attachment storage

use mirror_common::{FileCopyMode, Result, SyncError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Copy or hard-link `src` into `dest_dir` under a non-colliding name
pub fn copy_file(src: &Path, dest_dir: &Path, mode: FileCopyMode) -> Result<PathBuf> {
    let file_name = src.file_name().ok_or_else(|| SyncError::FileCopy {
        path: src.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name"),
    })?;

    fs::create_dir_all(dest_dir).map_err(|source| SyncError::FileCopy {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let dest = unique_path(dest_dir, Path::new(file_name));
    let copied = match mode {
        FileCopyMode::Copy => fs::copy(src, &dest).map(|_| ()),
        FileCopyMode::HardLink => fs::hard_link(src, &dest),
    };
    copied.map_err(|source| SyncError::FileCopy {
        path: src.to_path_buf(),
        source,
    })?;

    tracing::debug!("Copied {:?} -> {:?} ({:?})", src, dest, mode);
    Ok(dest)
}

/// `dir/file_name`, or `dir/stem-N.ext` with the first free N
pub fn unique_path(dir: &Path, file_name: &Path) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file_name
        .extension()
        .map(|e| e.to_string_lossy().into_owned());

    (1u32..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{stem}-{n}.{ext}")),
            None => dir.join(format!("{stem}-{n}")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Path of the `size` variant of a payload: `stem-size.ext` next to it
pub fn variant_path(path: &Path, size: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{size}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{size}"),
    };
    path.with_file_name(name)
}

/// Write one derived file per size next to `path`, replacing stale ones
pub fn write_variants(path: &Path, sizes: &[String]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(sizes.len());
    for size in sizes {
        let variant = variant_path(path, size);
        fs::copy(path, &variant).map_err(|source| SyncError::FileCopy {
            path: path.to_path_buf(),
            source,
        })?;
        written.push(variant);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_copy_file_bytes() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("src/photo.jpg");
        src.write_binary(b"jpeg bytes").unwrap();

        let dest_dir = temp.path().join("dest");
        let dest = copy_file(src.path(), &dest_dir, FileCopyMode::Copy).unwrap();

        assert_eq!(dest, dest_dir.join("photo.jpg"));
        assert_eq!(fs::read(&dest).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_copy_file_hard_link() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("src/doc.pdf");
        src.write_binary(b"%PDF").unwrap();

        let dest = copy_file(src.path(), &temp.path().join("dest"), FileCopyMode::HardLink).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"%PDF");
    }

    #[test]
    fn test_copy_file_never_overwrites() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("src/photo.jpg");
        src.write_binary(b"new").unwrap();
        let existing = temp.child("dest/photo.jpg");
        existing.write_binary(b"old").unwrap();

        let dest = copy_file(src.path(), &temp.path().join("dest"), FileCopyMode::Copy).unwrap();

        assert_eq!(dest.file_name().unwrap(), "photo-1.jpg");
        existing.assert("old");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = copy_file(
            &temp.path().join("missing.png"),
            &temp.path().join("dest"),
            FileCopyMode::Copy,
        );
        assert!(matches!(result, Err(SyncError::FileCopy { .. })));
    }

    #[test]
    fn test_variant_paths() {
        assert_eq!(
            variant_path(Path::new("/up/photo.jpg"), "thumbnail"),
            PathBuf::from("/up/photo-thumbnail.jpg")
        );
        assert_eq!(
            variant_path(Path::new("/up/README"), "medium"),
            PathBuf::from("/up/README-medium")
        );
    }
}
