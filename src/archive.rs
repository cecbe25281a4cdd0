// src/archive.rs

//! Archive expansion for single-file downloads and repository tarballs

use crate::error::{Error, Result};
use crate::filesystem::{make_executable, sanitize_path};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};
use zip::ZipArchive;

/// Container formats recognised by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveKind {
    /// Detect the container kind from the file name suffix
    ///
    /// ```
    /// use plugfetch::archive::ArchiveKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(ArchiveKind::from_path(Path::new("p.tar.gz")), Some(ArchiveKind::TarGz));
    /// assert_eq!(ArchiveKind::from_path(Path::new("p.zip")), Some(ArchiveKind::Zip));
    /// assert_eq!(ArchiveKind::from_path(Path::new("p.py")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Expand `file_path` into `target_dir` and delete the archive
///
/// Returns `false` without touching anything when the suffix is not a
/// recognised archive; the file is then the final artifact.
pub fn unpack(file_path: &Path, target_dir: &Path) -> Result<bool> {
    let Some(kind) = ArchiveKind::from_path(file_path) else {
        debug!("{} is not an archive, leaving it in place", file_path.display());
        return Ok(false);
    };

    info!("Extracting {} into {}", file_path.display(), target_dir.display());
    extract(file_path, target_dir, kind)?;

    fs::remove_file(file_path).map_err(|e| {
        Error::IoError(format!("Failed to remove archive {}: {e}", file_path.display()))
    })?;
    Ok(true)
}

/// Expand an archive of a known kind into `dest`
pub fn extract(archive: &Path, dest: &Path, kind: ArchiveKind) -> Result<()> {
    fs::create_dir_all(dest)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", dest.display())))?;

    let file = File::open(archive)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {e}", archive.display())))?;

    match kind {
        ArchiveKind::TarGz => extract_tar(GzDecoder::new(file), archive, dest),
        ArchiveKind::Tar => extract_tar(file, archive, dest),
        ArchiveKind::Zip => extract_zip(file, archive, dest),
    }
}

fn failed(archive: &Path, reason: impl ToString) -> Error {
    Error::ExtractionFailed {
        path: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
    let mut tar = Archive::new(reader);
    let entries = tar.entries().map_err(|e| failed(archive, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| failed(archive, e))?;
        let raw_path = entry.path().map_err(|e| failed(archive, e))?.into_owned();

        // pax global headers and the like carry no file
        let entry_type = entry.header().entry_type();
        if entry_type.is_pax_global_extensions() || entry_type.is_pax_local_extensions() {
            continue;
        }
        let Ok(rel) = sanitize_path(&raw_path) else {
            if raw_path.as_os_str().is_empty() || raw_path == Path::new(".") {
                continue;
            }
            return Err(failed(
                archive,
                format!("entry escapes destination: {}", raw_path.display()),
            ));
        };

        let out = dest.join(&rel);
        if entry_type.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&out)
            .map_err(|e| failed(archive, format!("{}: {e}", out.display())))?;
    }
    Ok(())
}

fn extract_zip(file: File, archive: &Path, dest: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(file).map_err(|e| failed(archive, e))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| failed(archive, e))?;
        let raw = entry.name().replace('\\', "/");
        let rel = sanitize_path(&raw)
            .map_err(|_| failed(archive, format!("entry escapes destination: {raw}")))?;
        let out = dest.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", out.display())))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|e| failed(archive, format!("{}: {e}", out.display())))?;

        if entry.unix_mode().is_some_and(|mode| mode & 0o111 != 0) {
            make_executable(&out)?;
        }
    }
    Ok(())
}

/// The single wrapper directory of an expanded archive, if there is one
///
/// Archive formats conventionally nest everything under one top-level
/// folder (`repo-master/`). Hidden siblings such as `pax_global_header`
/// leftovers do not count.
pub fn single_wrapper(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry);
    }

    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        return Ok(Some(entries[0].path()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn write_tar_gz(path: &Path, files: &[(&str, &str, u32)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_detect_kinds() {
        assert_eq!(ArchiveKind::from_path(Path::new("a.tgz")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_path(Path::new("a.TAR")), Some(ArchiveKind::Tar));
        assert_eq!(ArchiveKind::from_path(Path::new("a.tar.xz")), None);
        assert_eq!(ArchiveKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_unpack_tar_gz_removes_archive() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("plugin.tar.gz");
        write_tar_gz(
            &archive,
            &[("plugin.py", "print('hi')", 0o755), ("lib/util.py", "", 0o644)],
        );

        assert!(unpack(&archive, temp.path()).unwrap());
        assert!(!archive.exists());
        assert!(temp.path().join("plugin.py").is_file());
        assert!(temp.path().join("lib/util.py").is_file());
    }

    #[test]
    fn test_unpack_zip_removes_archive() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("plugin.zip");
        write_zip(&archive, &[("plugin/plugin.py", "x"), ("plugin/README", "y")]);

        assert!(unpack(&archive, temp.path()).unwrap());
        assert!(!archive.exists());
        assert!(temp.path().join("plugin/plugin.py").is_file());
        assert_eq!(
            single_wrapper(temp.path()).unwrap(),
            Some(temp.path().join("plugin"))
        );
    }

    #[test]
    fn test_unrecognised_suffix_left_alone() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("plugin.py");
        fs::write(&file, "x").unwrap();
        assert!(!unpack(&file, temp.path()).unwrap());
        assert!(file.exists());
    }

    #[test]
    fn test_zip_traversal_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &[("../escape.py", "x")]);

        let out = temp.path().join("out");
        let result = extract(&archive, &out, ArchiveKind::Zip);
        assert!(matches!(result, Err(Error::ExtractionFailed { .. })));
        assert!(!temp.path().join("escape.py").exists());
    }

    #[test]
    fn test_corrupt_archive() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();
        assert!(unpack(&archive, temp.path()).is_err());
        // The archive stays when extraction fails
        assert!(archive.exists());
    }

    #[test]
    fn test_single_wrapper_absent() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "").unwrap();
        fs::create_dir(temp.path().join("lib")).unwrap();
        assert_eq!(single_wrapper(temp.path()).unwrap(), None);
    }
}
