//! Shared type definitions for the shroud crate
//!
//! These types describe what the manifest declares and are used by the
//! scanner, the configuration layer and the CLI.

use serde::{Deserialize, Serialize};

/// Kind of an application entry-point component
///
/// Each kind corresponds to the manifest element name the platform uses to
/// declare it. Components are instantiated by their declared class name,
/// which is why renaming them requires touching the manifest as well as
/// the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// `<activity>`
    Activity,

    /// `<service>`
    Service,

    /// `<receiver>`
    Receiver,

    /// `<provider>`
    Provider,
}

impl ComponentKind {
    pub const ALL: [Self; 4] = [
        Self::Activity,
        Self::Service,
        Self::Receiver,
        Self::Provider,
    ];

    /// Manifest element name for this kind
    pub fn element_name(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Service => "service",
            Self::Receiver => "receiver",
            Self::Provider => "provider",
        }
    }

    /// Look up a kind by its manifest element name
    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.element_name() == name)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.element_name())
    }
}

/// A component declared in the manifest, with its name already resolved
/// against the manifest's `package` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDeclaration {
    pub kind: ComponentKind,
    pub qualified_name: String,
}
