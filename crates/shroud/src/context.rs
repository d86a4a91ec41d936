//! Explicit per-run state shared by the manifest, rewrite and rename stages
//!
//! An `ObfuscationContext` owns the configuration and the complete mapping
//! table. Once constructed it is only read, so per-file operations can be
//! called in any order and from any thread holding a shared reference.

use std::path::{Path, PathBuf};

use crate::{
    config::Config,
    error::Result,
    manifest::{ManifestDocument, ManifestScanner},
    mapping::MappingTable,
    names::IdentifierSource,
    renamer::FileRenamer,
    resolver::SourceRoots,
    rewriter::{RewriteOutcome, SourceRewriter},
};

#[derive(Debug)]
pub struct ObfuscationContext {
    config: Config,
    project_root: PathBuf,
    roots: SourceRoots,
    mapping: MappingTable,
}

impl ObfuscationContext {
    /// Context around an already complete mapping, e.g. one loaded from a
    /// checkpoint
    pub fn from_mapping(config: Config, project_root: &Path, mapping: MappingTable) -> Self {
        let roots = SourceRoots::new(project_root, &config.source_roots);
        Self {
            config,
            project_root: project_root.to_path_buf(),
            roots,
            mapping,
        }
    }

    /// Scan the project's manifest and build the mapping without writing
    /// anything. The rewritten document is returned alongside the context.
    pub fn scan_manifest(
        config: Config,
        project_root: &Path,
        ids: &mut dyn IdentifierSource,
    ) -> Result<(Self, ManifestDocument)> {
        Self::scan_manifest_extending(config, project_root, ids, &MappingTable::new())
    }

    /// Scan the manifest on top of the mapping of an earlier completed run
    pub fn scan_manifest_extending(
        config: Config,
        project_root: &Path,
        ids: &mut dyn IdentifierSource,
        previous: &MappingTable,
    ) -> Result<(Self, ManifestDocument)> {
        let scanner = ManifestScanner::new(config.components.clone());
        let outcome =
            scanner.scan_extending(&config.manifest_path(project_root), ids, previous)?;
        let context = Self::from_mapping(config, project_root, outcome.mapping);
        Ok((context, outcome.document))
    }

    /// Scan the manifest, rewrite it in place and return the context for
    /// the per-file stages. Nothing is written when scanning fails.
    pub fn scan_and_rewrite_manifest(
        config: Config,
        project_root: &Path,
        ids: &mut dyn IdentifierSource,
    ) -> Result<Self> {
        let (context, document) = Self::scan_manifest(config, project_root, ids)?;
        document.write()?;
        Ok(context)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    pub fn source_roots(&self) -> &SourceRoots {
        &self.roots
    }

    pub fn rewriter(&self) -> SourceRewriter<'_> {
        SourceRewriter::new(&self.mapping, &self.roots, self.config.rewrite_options())
    }

    pub fn renamer(&self) -> FileRenamer<'_> {
        FileRenamer::new(&self.mapping, &self.roots)
    }

    /// Rewrite one source file in place
    pub fn rewrite_file(&self, path: &Path) -> Result<RewriteOutcome> {
        self.rewriter().rewrite_file(path)
    }

    /// Rename one source file if it declares a component; returns its
    /// current path
    pub fn rename_file(&self, path: &Path) -> Result<PathBuf> {
        self.renamer().rename_file(path)
    }
}
