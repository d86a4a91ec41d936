//! Error taxonomy for the rename/rewrite engine
//!
//! Manifest-phase errors abort the whole run before any source file is
//! touched. Per-file errors are reported individually by the orchestrator
//! and never stop processing of other files.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObfuscateError {
    /// The manifest is missing, unreadable, malformed, or declares a
    /// component that cannot be resolved to a qualified name
    #[error("failed to parse manifest {}: {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    /// The rewritten manifest could not be serialized or written back
    #[error("failed to write manifest {}: {message}", path.display())]
    ManifestTransform { path: PathBuf, message: String },

    /// Reading, writing or renaming a single source file failed
    #[error("I/O error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The mapping checkpoint could not be read or persisted
    #[error("mapping checkpoint {}: {message}", path.display())]
    Checkpoint { path: PathBuf, message: String },

    /// The OS random source failed while generating an identifier
    #[error("failed to generate identifier: {0}")]
    NameGeneration(#[from] getrandom::Error),

    /// Renaming would overwrite an existing file
    #[error("cannot rename {} to {}: target already exists", from.display(), to.display())]
    RenameConflict { from: PathBuf, to: PathBuf },
}

impl ObfuscateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error belongs to the manifest phase, which aborts a run
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self,
            Self::ManifestParse { .. } | Self::ManifestTransform { .. }
        )
    }
}

pub type Result<T, E = ObfuscateError> = std::result::Result<T, E>;
