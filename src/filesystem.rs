// src/filesystem.rs

//! Filesystem helpers shared by the fetcher, unpacker and resolvers
//!
//! Paths coming from remote listings and archives are untrusted and go
//! through [`sanitize_path`] before they touch the disk.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Sanitize a path from an untrusted source
///
/// Rejects `..` components and empty results, drops `.` components and
/// strips leading slashes so the result is always relative.
///
/// ```
/// use plugfetch::filesystem::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("lib/util.py").unwrap(), PathBuf::from("lib/util.py"));
/// assert_eq!(sanitize_path("/lib/util.py").unwrap(), PathBuf::from("lib/util.py"));
/// assert!(sanitize_path("../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();
    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path_str.to_string())),
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::PathTraversal(format!("empty path '{path_str}'")));
    }
    Ok(normalized)
}

/// Join an untrusted relative path onto `root`
pub fn safe_join(root: &Path, untrusted: &str) -> Result<PathBuf> {
    Ok(root.join(sanitize_path(untrusted)?))
}

/// Add the owner/group/other execute bits to a file
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|e| Error::IoError(format!("Failed to stat {}: {e}", path.display())))?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms).map_err(|e| {
        Error::IoError(format!("Failed to make {} executable: {e}", path.display()))
    })
}

#[cfg(not(unix))]
pub fn make_executable(path: &Path) -> Result<()> {
    fs::metadata(path)
        .map(|_| ())
        .map_err(|e| Error::IoError(format!("Failed to stat {}: {e}", path.display())))
}

/// Whether any execute bit is set
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool {
    false
}

/// Non-hidden entries of `dir`, sorted by file name
///
/// Sorting makes every scan independent of directory iteration order.
pub fn visible_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", dir.display())))?
    {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Names of the non-hidden regular files directly inside `dir`, sorted
pub fn top_level_files(dir: &Path) -> Result<Vec<String>> {
    Ok(visible_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect())
}

/// Move every entry of `from` (hidden ones included) into `to`
///
/// `to` is created if missing. Fails if a name already exists in `to`.
pub fn move_dir_contents(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", to.display())))?;

    for entry in fs::read_dir(from)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", from.display())))?
    {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if dest.exists() {
            return Err(Error::IoError(format!(
                "Cannot move {} over existing {}",
                entry.path().display(),
                dest.display()
            )));
        }
        fs::rename(entry.path(), &dest).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {e}",
                entry.path().display(),
                dest.display()
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert!(sanitize_path("a/../../b").is_err());
        assert!(sanitize_path("..").is_err());
        assert!(sanitize_path("").is_err());
        assert!(sanitize_path("./").is_err());
        assert_eq!(sanitize_path("./a/./b").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn test_safe_join() {
        let root = Path::new("/plugins/x");
        assert_eq!(
            safe_join(root, "sub/file.py").unwrap(),
            PathBuf::from("/plugins/x/sub/file.py")
        );
        assert!(safe_join(root, "../escape").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("plugin.py");
        fs::write(&file, "#!/usr/bin/env python3\n").unwrap();
        assert!(!is_executable(&file));
        make_executable(&file).unwrap();
        assert!(is_executable(&file));
    }

    #[test]
    fn test_visible_entries_sorted_and_filtered() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["zeta.py", ".git", "alpha.py", "mid"] {
            fs::write(temp.path().join(name), "").unwrap();
        }
        let names: Vec<String> = visible_entries(temp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["alpha.py", "mid", "zeta.py"]);
    }

    #[test]
    fn test_move_dir_contents() {
        let temp = tempfile::tempdir().unwrap();
        let from = temp.path().join("wrapper");
        fs::create_dir_all(from.join("lib")).unwrap();
        fs::write(from.join("main.py"), "x").unwrap();
        fs::write(from.join("lib/util.py"), "y").unwrap();

        let to = temp.path().join("out");
        move_dir_contents(&from, &to).unwrap();
        assert!(to.join("main.py").is_file());
        assert!(to.join("lib/util.py").is_file());
        assert_eq!(fs::read_dir(&from).unwrap().count(), 0);
    }

    #[test]
    fn test_move_dir_contents_refuses_overwrite() {
        let temp = tempfile::tempdir().unwrap();
        let from = temp.path().join("a");
        let to = temp.path().join("b");
        fs::create_dir_all(&from).unwrap();
        fs::create_dir_all(&to).unwrap();
        fs::write(from.join("x"), "1").unwrap();
        fs::write(to.join("x"), "2").unwrap();
        assert!(move_dir_contents(&from, &to).is_err());
        assert_eq!(fs::read_to_string(to.join("x")).unwrap(), "2");
    }
}
