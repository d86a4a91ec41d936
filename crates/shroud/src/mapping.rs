//! The run's original → opaque qualified-name association
//!
//! A `MappingTable` is filled exactly once by the manifest scanner (or loaded
//! from a checkpoint) and only read afterwards. Mutation is crate-private so
//! the rewriter and renamer can only ever see a complete table.

use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ObfuscateError, Result},
    util::write_atomic,
};

/// Simple class name of a qualified name: everything after the last `.`
pub fn simple_name(qualified: &str) -> &str {
    qualified
        .rsplit_once('.')
        .map_or(qualified, |(_, simple)| simple)
}

/// Package of a qualified name: everything before the last `.`, or `""`
pub fn package_of(qualified: &str) -> &str {
    qualified.rsplit_once('.').map_or("", |(package, _)| package)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    /// Insertion order follows manifest declaration order
    #[serde(default)]
    components: IndexMap<String, String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. Returns the already-recorded opaque name if the
    /// original was mapped before, leaving the table unchanged.
    pub(crate) fn insert(&mut self, original: String, opaque: String) -> &str {
        debug_assert_eq!(package_of(&original), package_of(&opaque));
        self.components.entry(original).or_insert(opaque).as_str()
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.components.get(original).map(String::as_str)
    }

    pub fn contains(&self, original: &str) -> bool {
        self.components.contains_key(original)
    }

    /// Opaque simple name for an original qualified name
    pub fn opaque_simple_name(&self, original: &str) -> Option<&str> {
        self.get(original).map(simple_name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.components
            .iter()
            .map(|(original, opaque)| (original.as_str(), opaque.as_str()))
    }

    /// Entries ordered longest original name first, ties broken by name.
    /// Replacing in this order prevents a key that is a prefix of another key
    /// from clobbering the longer one.
    pub fn entries_longest_first(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        entries
    }

    /// Whether `name` is one of the generated opaque qualified names
    pub fn is_opaque(&self, name: &str) -> bool {
        self.components.values().any(|opaque| opaque == name)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Persist the table so an interrupted run can resume with the same
    /// names. `complete` records that the run finished, after which the
    /// checkpoint is only a record of the names already given out.
    pub fn save_checkpoint(&self, path: &Path, complete: bool) -> Result<()> {
        let file = CheckpointFile {
            complete,
            components: self.components.clone(),
        };
        let contents = toml::to_string(&file).map_err(|e| checkpoint_error(path, e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| checkpoint_error(path, e))?;
        }
        write_atomic(path, contents.as_bytes())?;
        info!(
            "Wrote {} mapping checkpoint with {} entries to {}",
            if complete { "completed" } else { "in-progress" },
            self.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a previously persisted table. Returns `Ok(None)` when no
    /// checkpoint exists at `path`.
    pub fn load_checkpoint(path: &Path) -> Result<Option<Checkpoint>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(checkpoint_error(path, e)),
        };
        let file: CheckpointFile = toml::from_str(&contents).map_err(|e| checkpoint_error(path, e))?;
        let mapping = Self {
            components: file.components,
        };
        if let Some((original, opaque)) = mapping
            .iter()
            .find(|(original, opaque)| package_of(original) != package_of(opaque))
        {
            return Err(checkpoint_error(
                path,
                format!("entry {original} -> {opaque} changes the package"),
            ));
        }
        debug!("Loaded {} mapping entries from {}", mapping.len(), path.display());
        Ok(Some(Checkpoint {
            mapping,
            complete: file.complete,
        }))
    }
}

/// A mapping read back from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub mapping: MappingTable,
    /// The run that wrote it finished without failures
    pub complete: bool,
}

impl Checkpoint {
    /// Whether a new run should pick up where this one stopped
    pub fn is_resumable(&self) -> bool {
        !self.complete && !self.mapping.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    components: IndexMap<String, String>,
}

fn checkpoint_error(path: &Path, message: impl std::fmt::Display) -> ObfuscateError {
    ObfuscateError::Checkpoint {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
