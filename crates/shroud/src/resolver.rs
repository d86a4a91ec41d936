//! Derivation of a source file's declared qualified name from its path
//!
//! A file at `<root>/com/example/app/MainActivity.java` under the source root
//! `<root>` declares `com.example.app.MainActivity`. The derived name is the
//! join key into the mapping table, so it must always be computed from the
//! file's original path, before any rename.

use std::path::{Component, Path, PathBuf};

use log::warn;

#[derive(Debug, Clone)]
pub struct SourceRoots {
    roots: Vec<PathBuf>,
}

impl SourceRoots {
    /// Build the resolver from source roots given relative to `project_root`
    /// (absolute roots are used as-is)
    pub fn new(project_root: &Path, roots: &[PathBuf]) -> Self {
        let roots = roots
            .iter()
            .map(|root| canonicalize_path(project_root.join(root)))
            .collect();
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Qualified name declared by the file at `path`, or `None` when the file
    /// is not below any source root
    pub fn declared_name(&self, path: &Path) -> Option<String> {
        let path = absolute_path(path);
        let relative = self
            .roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())?;
        qualified_name_from_relative(relative)
    }
}

/// Join the relative path's components with `.` and drop the extension
fn qualified_name_from_relative(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    let file_name = parts.pop()?;
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem);
    if stem.is_empty() {
        return None;
    }
    parts.push(stem);
    Some(parts.join("."))
}

/// Canonicalize a path, falling back to the original when that fails
fn canonicalize_path(path: PathBuf) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(e) => {
            warn!("Failed to canonicalize path {}: {}", path.display(), e);
            path
        }
    }
}

/// Canonicalize an existing file path; the parent is canonicalized instead
/// when the file itself does not exist
fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map_or_else(|_| path.to_path_buf(), |parent| parent.join(name)),
        _ => path.to_path_buf(),
    }
}
