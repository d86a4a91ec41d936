//! Renames a component's source file to match its opaque simple name
//!
//! The lookup key is derived from the file's path, so a file must be renamed
//! only after its content has been rewritten.

use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    error::{ObfuscateError, Result},
    mapping::MappingTable,
    resolver::SourceRoots,
};

#[derive(Debug, Clone, Copy)]
pub struct FileRenamer<'a> {
    mapping: &'a MappingTable,
    roots: &'a SourceRoots,
}

impl<'a> FileRenamer<'a> {
    pub fn new(mapping: &'a MappingTable, roots: &'a SourceRoots) -> Self {
        Self { mapping, roots }
    }

    /// Path the file would be renamed to, or `None` when it does not declare
    /// a mapped component
    pub fn target_path(&self, path: &Path) -> Option<PathBuf> {
        let declared = self.roots.declared_name(path)?;
        let opaque = self.mapping.opaque_simple_name(&declared)?;
        let file_name = match path.extension() {
            Some(ext) => format!("{opaque}.{}", ext.to_string_lossy()),
            None => opaque.to_owned(),
        };
        Some(path.with_file_name(file_name))
    }

    /// Rename the file if it declares a mapped component and return its
    /// current path. Refuses to overwrite an existing file.
    pub fn rename_file(&self, path: &Path) -> Result<PathBuf> {
        let Some(target) = self.target_path(path) else {
            return Ok(path.to_path_buf());
        };
        if target.exists() {
            return Err(ObfuscateError::RenameConflict {
                from: path.to_path_buf(),
                to: target,
            });
        }
        std::fs::rename(path, &target).map_err(|e| ObfuscateError::io(path, e))?;
        debug!("Renamed {} -> {}", path.display(), target.display());
        Ok(target)
    }
}
