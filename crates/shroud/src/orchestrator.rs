//! Run orchestration
//!
//! A run has two phases separated by a barrier. First the mapping is
//! established: either loaded from the checkpoint of an interrupted run, or
//! built by scanning the manifest, persisted as a checkpoint and applied to
//! the manifest. Only then is the source tree walked and every file
//! rewritten and, if it declares a component, renamed.
//!
//! A run that finishes without failures marks its checkpoint complete. The
//! next run scans the manifest again on top of the completed mapping, so
//! components added since are picked up and names already given out stay.

use std::{
    io,
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::{
    config::Config,
    context::ObfuscationContext,
    error::{ObfuscateError, Result},
    manifest::{ManifestDocument, ManifestScanner},
    mapping::MappingTable,
    names::IdentifierSource,
    renamer::FileRenamer,
    rewriter::{RewriteOutcome, SourceRewriter},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore an existing checkpoint and scan the manifest again
    pub fresh: bool,
    /// Compute everything but write nothing
    pub dry_run: bool,
}

/// A file whose processing failed; the rest of the run continued
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: ObfuscateError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub mapping: MappingTable,
    /// The mapping came from a checkpoint rather than a fresh scan
    pub resumed: bool,
    pub dry_run: bool,
    pub rewritten: Vec<PathBuf>,
    pub unchanged: usize,
    /// `(original, renamed)` pairs
    pub renamed: Vec<(PathBuf, PathBuf)>,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    config: Config,
    project_root: PathBuf,
}

impl Orchestrator {
    pub fn new(config: Config, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline. Manifest and checkpoint failures abort the
    /// run before any source file is touched; per-file failures are
    /// collected in the report.
    pub fn run(&self, ids: &mut dyn IdentifierSource, options: RunOptions) -> Result<RunReport> {
        let (context, resumed) = self.establish_mapping(ids, options)?;
        let mut report = RunReport {
            resumed,
            dry_run: options.dry_run,
            ..RunReport::default()
        };

        let checkpoint = self.config.checkpoint_path(&self.project_root);
        if context.mapping().is_empty() {
            warn!("The manifest declares no components; nothing to rewrite");
            if !options.dry_run {
                context.mapping().save_checkpoint(&checkpoint, true)?;
            }
            report.mapping = context.mapping().clone();
            return Ok(report);
        }

        let files = self.collect_source_files(&mut report.failures);
        info!("Processing {} source files", files.len());

        let rewriter = context.rewriter();
        let renamer = context.renamer();
        for path in &files {
            Self::process_file(&rewriter, &renamer, path, options.dry_run, &mut report);
        }

        info!(
            "Rewrote {} files, renamed {}, left {} unchanged, {} failed",
            report.rewritten.len(),
            report.renamed.len(),
            report.unchanged,
            report.failures.len()
        );
        if !options.dry_run && report.is_success() {
            context.mapping().save_checkpoint(&checkpoint, true)?;
        }
        report.mapping = context.mapping().clone();
        Ok(report)
    }

    fn establish_mapping(
        &self,
        ids: &mut dyn IdentifierSource,
        options: RunOptions,
    ) -> Result<(ObfuscationContext, bool)> {
        let checkpoint = self.config.checkpoint_path(&self.project_root);

        let mut previous = MappingTable::new();
        if !options.fresh {
            match MappingTable::load_checkpoint(&checkpoint)? {
                Some(saved) if saved.is_resumable() => {
                    info!(
                        "Resuming with {} mapping entries from {}",
                        saved.mapping.len(),
                        checkpoint.display()
                    );
                    self.reapply_manifest(&saved.mapping, options.dry_run)?;
                    let context = ObfuscationContext::from_mapping(
                        self.config.clone(),
                        &self.project_root,
                        saved.mapping,
                    );
                    return Ok((context, true));
                }
                Some(saved) if saved.complete => {
                    info!(
                        "Previous run completed with {} entries; scanning for new components",
                        saved.mapping.len()
                    );
                    previous = saved.mapping;
                }
                Some(_) => debug!("Ignoring empty checkpoint {}", checkpoint.display()),
                None => {}
            }
        }

        let (context, document) = ObfuscationContext::scan_manifest_extending(
            self.config.clone(),
            &self.project_root,
            ids,
            &previous,
        )?;
        if !options.dry_run {
            context.mapping().save_checkpoint(&checkpoint, false)?;
            if document.is_modified() {
                document.write()?;
            }
        }
        Ok((context, false))
    }

    /// Bring the manifest in line with a checkpointed mapping. A manifest
    /// already rewritten by the interrupted run is left as it is.
    fn reapply_manifest(&self, mapping: &MappingTable, dry_run: bool) -> Result<()> {
        let scanner = ManifestScanner::new(self.config.components.clone());
        let mut document = ManifestDocument::load(&self.config.manifest_path(&self.project_root))?;
        let rewritten = document.apply(mapping, scanner.kinds())?;
        if rewritten > 0 && !dry_run {
            info!("Manifest still had {rewritten} original names; rewriting it");
            document.write()?;
        }
        Ok(())
    }

    /// All source files below the project root, collected before anything
    /// is renamed
    pub fn collect_source_files(&self, failures: &mut Vec<FileFailure>) -> Vec<PathBuf> {
        let walker = WalkDir::new(&self.project_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.config.is_ignored_dir(name))
            });

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.config.is_source_file(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.project_root.clone(), Path::to_path_buf);
                    error!("Failed to walk {}: {}", path.display(), e);
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop"));
                    failures.push(FileFailure {
                        path: path.clone(),
                        error: ObfuscateError::io(path, source),
                    });
                }
            }
        }
        files
    }

    /// Rewrite then rename one file. A failure aborts only this file. In a
    /// dry run the outcome is computed but nothing is written.
    fn process_file(
        rewriter: &SourceRewriter<'_>,
        renamer: &FileRenamer<'_>,
        path: &Path,
        dry_run: bool,
        report: &mut RunReport,
    ) {
        let result = if dry_run {
            rewriter.preview_file(path).map(|outcome| {
                let target = renamer
                    .target_path(path)
                    .unwrap_or_else(|| path.to_path_buf());
                (outcome, target)
            })
        } else {
            rewriter.rewrite_file(path).and_then(|outcome| {
                let renamed = renamer.rename_file(path)?;
                Ok((outcome, renamed))
            })
        };

        match result {
            Ok((outcome, renamed)) => {
                match outcome {
                    RewriteOutcome::Rewritten => report.rewritten.push(path.to_path_buf()),
                    RewriteOutcome::Unchanged => report.unchanged += 1,
                }
                if renamed != path {
                    debug!("{} -> {}", path.display(), renamed.display());
                    report.renamed.push((path.to_path_buf(), renamed));
                }
            }
            Err(e) => {
                error!("{e}");
                report.failures.push(FileFailure {
                    path: path.to_path_buf(),
                    error: e,
                });
            }
        }
    }
}
