//! Renames Android application components to opaque identifiers
//!
//! The manifest is scanned for activities, services, receivers and
//! providers. Each gets a random opaque simple name within its own package,
//! the manifest is rewritten, and every source file under the project is
//! rewritten to use the new names. Files declaring a component are renamed
//! to match.

pub mod config;
pub mod context;
pub mod error;
pub mod manifest;
pub mod mapping;
pub mod matcher;
pub mod names;
pub mod orchestrator;
pub mod renamer;
pub mod resolver;
pub mod rewriter;
pub mod types;
pub mod util;

pub use context::ObfuscationContext;
pub use error::{ObfuscateError, Result};
pub use mapping::MappingTable;
pub use orchestrator::{Orchestrator, RunOptions, RunReport};
