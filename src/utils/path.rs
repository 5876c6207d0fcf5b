//! Path normalization.
//!
//! Definitions remember the path of the file they were loaded from and the
//! watch trigger compares event paths against it, so every path handed to
//! the runtime goes through [`normalize_path`] first.

use std::path::{Path, PathBuf};

/// Normalize a path to absolute form.
///
/// Uses `canonicalize` when the path exists. A missing file under an
/// existing directory keeps its name on the canonical parent, anything else
/// is joined onto the current directory as-is.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = canonical_dir(parent)
    {
        return parent.join(name);
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}

fn canonical_dir(dir: &Path) -> std::io::Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        std::env::current_dir()?.canonicalize()
    } else {
        dir.canonicalize()
    }
}

/// `path` relative to the current directory when it lies below it.
pub fn display_relative(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(normalize_path(&cwd)).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
