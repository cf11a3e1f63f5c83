use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Every regular file below `dir`, in file-name order per directory.
///
/// A missing `dir` is reported as [`io::ErrorKind::NotFound`] so callers can
/// decide whether the directory was optional.
pub fn walk(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("directory {} does not exist", dir.display()),
        ));
    }

    let mut files = vec![];
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Like [`walk`], but a missing `dir` is simply empty.
pub fn walk_optional(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        log::debug!("skipping missing directory {}", dir.display());
        return Ok(vec![]);
    }
    walk(dir)
}
