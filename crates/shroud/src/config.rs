//! Run configuration
//!
//! Configuration is assembled from layers, later layers winning:
//! built-in defaults, the user config file, `shroud.toml` in the project
//! root, an explicit `--config` file, and finally command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use etcetera::{BaseStrategy, choose_base_strategy};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    matcher::MatchPolicy, names::DEFAULT_NAME_BITS, rewriter::RewriteOptions, types::ComponentKind,
};

pub const PROJECT_CONFIG_FILE: &str = "shroud.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Manifest path relative to the project root
    pub manifest: PathBuf,
    /// Directories whose layout mirrors the package structure
    pub source_roots: Vec<PathBuf>,
    /// Extensions of files to rewrite, without the dot
    pub extensions: Vec<String>,
    /// Directory names skipped while walking the project
    pub ignore: Vec<String>,
    /// Manifest element kinds treated as renameable components
    pub components: Vec<ComponentKind>,
    pub match_policy: MatchPolicy,
    /// Treat same-package components as implicitly imported
    pub same_package: bool,
    /// Treat components of wildcard-imported packages as imported
    pub wildcard_imports: bool,
    /// Mapping checkpoint path relative to the project root
    pub checkpoint: PathBuf,
    /// Random bits per generated identifier body
    pub name_bits: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("app/src/main/AndroidManifest.xml"),
            source_roots: vec![
                PathBuf::from("app/src/main/java"),
                PathBuf::from("app/src/main/kotlin"),
            ],
            extensions: vec!["java".to_owned(), "kt".to_owned()],
            ignore: [".git", ".gradle", ".idea", ".shroud", "build"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            components: ComponentKind::ALL.to_vec(),
            match_policy: MatchPolicy::default(),
            same_package: true,
            wildcard_imports: true,
            checkpoint: PathBuf::from(".shroud/mapping.toml"),
            name_bits: DEFAULT_NAME_BITS,
        }
    }
}

/// One configuration file; every field is optional so files can be layered
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigLayer {
    pub manifest: Option<PathBuf>,
    pub source_roots: Option<Vec<PathBuf>>,
    pub extensions: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
    pub components: Option<Vec<ComponentKind>>,
    pub match_policy: Option<MatchPolicy>,
    pub same_package: Option<bool>,
    pub wildcard_imports: Option<bool>,
    pub checkpoint: Option<PathBuf>,
    pub name_bits: Option<u32>,
}

impl ConfigLayer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

impl Config {
    /// Load configuration for `project_root`, with an optional explicit file
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(project_root, user_config_path().as_deref(), explicit)
    }

    /// Load configuration with the user config file given explicitly
    /// (`None` skips that layer)
    pub fn load_from(
        project_root: &Path,
        user_config: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_config) = user_config.filter(|p| p.is_file()) {
            debug!("Loading user config from {}", user_config.display());
            config.merge(ConfigLayer::from_file(&user_config)?);
        }

        let project_config = project_root.join(PROJECT_CONFIG_FILE);
        if project_config.is_file() {
            debug!("Loading project config from {}", project_config.display());
            config.merge(ConfigLayer::from_file(&project_config)?);
        }

        if let Some(explicit) = explicit {
            debug!("Loading config from {}", explicit.display());
            config.merge(ConfigLayer::from_file(explicit)?);
        }

        Ok(config)
    }

    pub fn merge(&mut self, layer: ConfigLayer) {
        let ConfigLayer {
            manifest,
            source_roots,
            extensions,
            ignore,
            components,
            match_policy,
            same_package,
            wildcard_imports,
            checkpoint,
            name_bits,
        } = layer;

        if let Some(manifest) = manifest {
            self.manifest = manifest;
        }
        if let Some(source_roots) = source_roots {
            self.source_roots = source_roots;
        }
        if let Some(extensions) = extensions {
            self.extensions = extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_owned())
                .collect();
        }
        if let Some(ignore) = ignore {
            self.ignore = ignore;
        }
        if let Some(components) = components {
            self.components = components;
        }
        if let Some(match_policy) = match_policy {
            self.match_policy = match_policy;
        }
        if let Some(same_package) = same_package {
            self.same_package = same_package;
        }
        if let Some(wildcard_imports) = wildcard_imports {
            self.wildcard_imports = wildcard_imports;
        }
        if let Some(checkpoint) = checkpoint {
            self.checkpoint = checkpoint;
        }
        if let Some(name_bits) = name_bits {
            self.name_bits = name_bits;
        }
    }

    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            policy: self.match_policy,
            same_package: self.same_package,
            wildcard_imports: self.wildcard_imports,
        }
    }

    pub fn manifest_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.manifest)
    }

    pub fn checkpoint_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.checkpoint)
    }

    /// Whether a file with this path should be rewritten
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }

    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored == name)
    }
}

/// `<config dir>/shroud/shroud.toml`, if a home directory can be found
fn user_config_path() -> Option<PathBuf> {
    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("shroud").join(PROJECT_CONFIG_FILE))
}
