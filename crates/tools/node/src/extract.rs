//! Unpacking of distribution archives.
//!
//! Archives are extracted into a hidden sibling directory and only renamed to
//! their final name once every entry has been written, so an interrupted
//! extraction never looks like an installed runtime.

use flate2::read::GzDecoder;
use noderig_core::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

/// Archive formats used by Node.js distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// gzip-compressed tarball
    TarGz,
    /// zip archive
    Zip,
}

impl ArchiveKind {
    /// Infer the format from a file name.
    pub fn from_file_name(name: &str) -> Result<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".zip") {
            Ok(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else {
            Err(Error::extraction(
                Path::new(name),
                "unrecognized archive format",
            ))
        }
    }
}

/// Extract `archive` so that its top-level directory ends up at `dest`.
///
/// Any existing `dest` is replaced. Runs on the blocking thread pool.
pub async fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let archive_for_error = archive.clone();
    tokio::task::spawn_blocking(move || unpack_blocking(&archive, &dest))
        .await
        .map_err(|e| Error::extraction(&archive_for_error, format!("extraction task failed: {e}")))?
}

fn unpack_blocking(archive: &Path, dest: &Path) -> Result<()> {
    let file_name = archive
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let kind = ArchiveKind::from_file_name(file_name)?;

    let temp_dir = temp_dir_for(dest);
    if temp_dir.exists() {
        fs::remove_dir_all(&temp_dir)
            .map_err(|e| Error::io(e, Some(temp_dir.clone()), "remove_dir_all"))?;
    }
    fs::create_dir_all(&temp_dir)
        .map_err(|e| Error::io(e, Some(temp_dir.clone()), "create_dir_all"))?;

    debug!(archive = %archive.display(), ?kind, "Extracting archive");
    let extracted = match kind {
        ArchiveKind::TarGz => extract_tar_gz(archive, &temp_dir),
        ArchiveKind::Zip => extract_zip(archive, &temp_dir),
    };

    // On failure, clean up temp directory
    if let Err(e) = extracted {
        let _ = fs::remove_dir_all(&temp_dir);
        return Err(e);
    }

    let root = match single_top_level_dir(&temp_dir) {
        Ok(root) => root,
        Err(e) => {
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(e);
        }
    };

    let placed = move_into_place(&root, dest);
    // Already gone when the extraction root itself was renamed
    let _ = fs::remove_dir_all(&temp_dir);
    placed?;

    debug!(dest = %dest.display(), "Archive extracted");
    Ok(())
}

fn move_into_place(root: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)
            .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "remove_dir_all"))?;
    }
    fs::rename(root, dest).map_err(|e| Error::io(e, Some(dest.to_path_buf()), "rename"))
}

/// `.{name}.tmp` next to `dest`.
#[must_use]
pub fn temp_dir_for(dest: &Path) -> PathBuf {
    dest.with_file_name(format!(
        ".{}.tmp",
        dest.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("extract")
    ))
}

fn extract_tar_gz(archive: &Path, into: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(e, Some(archive.to_path_buf()), "open"))?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);
    tar.unpack(into)
        .map_err(|e| Error::extraction(archive, format!("Failed to extract tar: {e}")))
}

fn extract_zip(archive: &Path, into: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(e, Some(archive.to_path_buf()), "open"))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::extraction(archive, format!("Failed to open zip: {e}")))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::extraction(archive, format!("Failed to read zip entry: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let outpath = into.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)
                .map_err(|e| Error::io(e, Some(outpath.clone()), "create_dir_all"))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(e, Some(parent.to_path_buf()), "create_dir_all"))?;
        }
        let mut out =
            File::create(&outpath).map_err(|e| Error::io(e, Some(outpath.clone()), "create"))?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            Error::extraction(archive, format!("Failed to write {}: {e}", outpath.display()))
        })?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                .map_err(|e| Error::io(e, Some(outpath.clone()), "set_permissions"))?;
        }
    }
    Ok(())
}

/// Node.js archives wrap everything in one `node-v...` directory. Unwrap it when
/// present, otherwise the extraction root itself is the runtime root.
fn single_top_level_dir(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::io(e, Some(dir.to_path_buf()), "read_dir"))?
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| Error::io(e, Some(dir.to_path_buf()), "read_dir"))?;

    match entries.as_slice() {
        [] => Err(Error::extraction(dir, "archive is empty")),
        [only] if only.path().is_dir() => Ok(only.path()),
        _ => Ok(dir.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, top: &str, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::fast()));
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{top}/{name}"), *data)
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_zip(path: &Path, top: &str, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in files {
            zip.start_file(format!("{top}/{name}"), options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_archive_kind() {
        assert_eq!(
            ArchiveKind::from_file_name("node-v18.0.0-win-x64.zip").unwrap(),
            ArchiveKind::Zip
        );
        assert_eq!(
            ArchiveKind::from_file_name("node-v18.0.0-linux-x64.tar.gz").unwrap(),
            ArchiveKind::TarGz
        );
        assert!(ArchiveKind::from_file_name("node-v18.0.0-linux-x64.tar.xz").is_err());
    }

    #[test]
    fn test_temp_dir_for() {
        assert_eq!(
            temp_dir_for(Path::new("/w/node-v18.0.0-linux-x64")),
            PathBuf::from("/w/.node-v18.0.0-linux-x64.tmp")
        );
    }

    #[tokio::test]
    async fn test_unpack_tar_gz_unwraps_top_dir() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("node-v18.0.0-linux-x64.tar.gz");
        write_tar_gz(
            &archive,
            "node-v18.0.0-linux-x64",
            &[("bin/node", b"#!/bin/sh\n"), ("lib/node_modules/npm/bin/npm-cli.js", b"")],
        );

        let dest = temp.path().join("node-v18.0.0-linux-x64");
        unpack(&archive, &dest).await.unwrap();

        assert!(dest.join("bin/node").is_file());
        assert!(dest.join("lib/node_modules/npm/bin/npm-cli.js").is_file());
        assert!(!temp_dir_for(&dest).exists());
    }

    #[tokio::test]
    async fn test_unpack_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("node-v18.0.0-win-x64.zip");
        write_zip(
            &archive,
            "node-v18.0.0-win-x64",
            &[("node.exe", b"MZ"), ("npm.cmd", b"@echo off")],
        );

        let dest = temp.path().join("node-v18.0.0-win-x64");
        unpack(&archive, &dest).await.unwrap();

        assert_eq!(std::fs::read(dest.join("node.exe")).unwrap(), b"MZ");
        assert!(dest.join("npm.cmd").is_file());
    }

    #[tokio::test]
    async fn test_unpack_replaces_stale_destination() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("node-v18.0.0-linux-x64.tar.gz");
        write_tar_gz(&archive, "node-v18.0.0-linux-x64", &[("bin/node", b"new")]);

        let dest = temp.path().join("node-v18.0.0-linux-x64");
        std::fs::create_dir_all(dest.join("leftover")).unwrap();

        unpack(&archive, &dest).await.unwrap();

        assert!(!dest.join("leftover").exists());
        assert_eq!(std::fs::read(dest.join("bin/node")).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_placement_removes_temp_dir() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("node-v18.0.0-linux-x64.tar.gz");
        write_tar_gz(&archive, "node-v18.0.0-linux-x64", &[("bin/node", b"new")]);

        // a file where the runtime directory belongs cannot be cleared as a directory
        let dest = temp.path().join("node-v18.0.0-linux-x64");
        std::fs::write(&dest, b"not a directory").unwrap();

        let err = unpack(&archive, &dest).await.unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert!(!temp_dir_for(&dest).exists());
    }

    #[tokio::test]
    async fn test_truncated_archive_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("node-v18.0.0-linux-x64.tar.gz");
        std::fs::write(&archive, b"\x1f\x8b\x08\x00garbage").unwrap();

        let dest = temp.path().join("node-v18.0.0-linux-x64");
        let err = unpack(&archive, &dest).await.unwrap_err();

        assert!(matches!(err, Error::Extraction { .. }));
        assert!(!dest.exists());
        assert!(!temp_dir_for(&dest).exists());
    }
}
