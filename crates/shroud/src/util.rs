//! File helpers shared by the manifest, rewriter and renamer stages

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::{ObfuscateError, Result};

/// Replace the contents of `path` without ever exposing a half-written file.
///
/// The data goes to a temporary file in the same directory, which is then
/// renamed over the target. The original permissions are carried over when
/// the target already exists.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| ObfuscateError::io(path, e))?;
    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| ObfuscateError::io(path, e))?;

    if let Ok(metadata) = std::fs::metadata(path) {
        std::fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|e| ObfuscateError::io(path, e))?;
    }

    temp.persist(path)
        .map_err(|e| ObfuscateError::io(path, e.error))?;
    Ok(())
}

/// Read a source file as UTF-8 text
pub fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ObfuscateError::io(path, e))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
