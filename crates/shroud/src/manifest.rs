//! Manifest scanning and rewriting
//!
//! The manifest is loaded into an owned list of XML events, which keeps
//! comments, processing instructions and namespace prefixes intact. The
//! scanner walks the component elements, resolves each `android:name`
//! against the root `package` attribute, draws an opaque simple name for
//! it and records the association in a [`MappingTable`].
//!
//! Nothing is written until the whole document has been parsed and every
//! component resolved, so a failure leaves the manifest untouched.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesStart, Event},
};

use crate::{
    error::{ObfuscateError, Result},
    mapping::{MappingTable, package_of, simple_name},
    names::IdentifierSource,
    types::{ComponentDeclaration, ComponentKind},
    util::write_atomic,
};

const PACKAGE_ATTRIBUTE: &[u8] = b"package";
const NAME_ATTRIBUTE: &[u8] = b"name";
const ALIAS_ELEMENT: &[u8] = b"activity-alias";
const TARGET_ACTIVITY_ATTRIBUTE: &[u8] = b"targetActivity";
const INDENT_WIDTH: usize = 4;

/// A parsed manifest held as an owned event list
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    path: PathBuf,
    events: Vec<Event<'static>>,
    package: Option<String>,
    modified: bool,
}

/// Result of scanning a manifest: the rewritten document, not yet written,
/// and the mapping it was rewritten with
#[derive(Debug)]
pub struct ScanOutcome {
    pub document: ManifestDocument,
    pub mapping: MappingTable,
    pub components: Vec<ComponentDeclaration>,
}

impl ManifestDocument {
    /// Read and parse the manifest at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| parse_error(path, e))?;
        Self::parse(path, &source)
    }

    /// Parse manifest text. `path` is only used for error reporting and as
    /// the default write target.
    pub fn parse(path: &Path, source: &str) -> Result<Self> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut events = Vec::new();
        let mut package = None;
        let mut seen_root = false;
        let mut depth = 0usize;
        loop {
            let event = reader.read_event().map_err(|e| {
                parse_error(
                    path,
                    format!("{e} at byte {}", reader.error_position()),
                )
            })?;
            match &event {
                Event::Eof => break,
                Event::Start(start) | Event::Empty(start) if !seen_root => {
                    seen_root = true;
                    package = attribute_value(start, PACKAGE_ATTRIBUTE)
                        .map_err(|message| parse_error(path, message))?;
                }
                _ => {}
            }
            match &event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth = depth.saturating_sub(1),
                _ => {}
            }
            events.push(event.into_owned());
        }

        if !seen_root {
            return Err(parse_error(path, "no root element"));
        }
        if depth > 0 {
            return Err(parse_error(path, format!("{depth} unclosed elements at end of input")));
        }

        Ok(Self {
            path: path.to_path_buf(),
            events,
            package,
            modified: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The root element's `package` attribute
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Components of the given kinds, in document order, with resolved names
    pub fn components(&self, kinds: &[ComponentKind]) -> Result<Vec<ComponentDeclaration>> {
        let mut components = Vec::new();
        for event in &self.events {
            if let Some((kind, value)) = self.component_name(event, kinds)? {
                components.push(ComponentDeclaration {
                    kind,
                    qualified_name: self.resolve(&value)?,
                });
            }
        }
        Ok(components)
    }

    /// Overwrite the name of every component whose resolved name is a key
    /// of `mapping` with its opaque qualified name, along with the
    /// `targetActivity` of every `<activity-alias>` pointing at one. Names
    /// that are not keys, including names rewritten by an earlier run, are
    /// left alone.
    ///
    /// Returns the number of attributes rewritten.
    pub fn apply(&mut self, mapping: &MappingTable, kinds: &[ComponentKind]) -> Result<usize> {
        let mut rewritten = 0;
        for index in 0..self.events.len() {
            let Some((attribute, value)) = self.class_reference(&self.events[index], kinds)? else {
                continue;
            };
            let qualified = self.resolve(&value)?;
            let Some(opaque) = mapping.get(&qualified) else {
                continue;
            };
            let replacement = match &self.events[index] {
                Event::Start(start) => Event::Start(self.with_attribute(start, attribute, opaque)?),
                Event::Empty(start) => Event::Empty(self.with_attribute(start, attribute, opaque)?),
                _ => continue,
            };
            self.events[index] = replacement;
            rewritten += 1;
        }
        if rewritten > 0 {
            self.modified = true;
        }
        Ok(rewritten)
    }

    /// Whether [`apply`](Self::apply) changed anything since parsing
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Serialize the document as indented UTF-8 XML
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
        if !matches!(self.events.first(), Some(Event::Decl(_))) {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
                .map_err(|e| self.transform_error(e))?;
        }
        for event in &self.events {
            writer
                .write_event(event.clone())
                .map_err(|e| self.transform_error(e))?;
        }
        let mut output = writer.into_inner();
        output.push(b'\n');
        Ok(output)
    }

    /// Serialize and atomically replace the manifest file
    pub fn write(&self) -> Result<()> {
        let output = self.render()?;
        write_atomic(&self.path, &output).map_err(|e| self.transform_error(e))?;
        info!("Rewrote manifest {}", self.path.display());
        Ok(())
    }

    /// Resolve a manifest name against the package: a leading `.` or a name
    /// without any `.` is package-relative, anything else is qualified
    pub fn resolve(&self, value: &str) -> Result<String> {
        if value.contains('.') && !value.starts_with('.') {
            return Ok(value.to_owned());
        }
        let Some(package) = self.package.as_deref().filter(|p| !p.is_empty()) else {
            return Err(parse_error(
                &self.path,
                format!("relative component name {value:?} but the manifest has no package"),
            ));
        };
        if value.starts_with('.') {
            Ok(format!("{package}{value}"))
        } else {
            Ok(format!("{package}.{value}"))
        }
    }

    fn component_name(
        &self,
        event: &Event<'_>,
        kinds: &[ComponentKind],
    ) -> Result<Option<(ComponentKind, String)>> {
        let start = match event {
            Event::Start(start) | Event::Empty(start) => start,
            _ => return Ok(None),
        };
        let local_name = start.local_name();
        let Some(kind) = std::str::from_utf8(local_name.as_ref())
            .ok()
            .and_then(ComponentKind::from_element_name)
            .filter(|kind| kinds.contains(kind))
        else {
            return Ok(None);
        };
        let value = attribute_value(start, NAME_ATTRIBUTE)
            .map_err(|message| parse_error(&self.path, message))?
            .ok_or_else(|| parse_error(&self.path, format!("<{kind}> element without a name")))?;
        Ok(Some((kind, value)))
    }

    /// The attribute naming a component class on this element, if any: the
    /// `name` of a component, or the `targetActivity` of an activity alias
    fn class_reference(
        &self,
        event: &Event<'_>,
        kinds: &[ComponentKind],
    ) -> Result<Option<(&'static [u8], String)>> {
        if let Some((_, value)) = self.component_name(event, kinds)? {
            return Ok(Some((NAME_ATTRIBUTE, value)));
        }
        let start = match event {
            Event::Start(start) | Event::Empty(start) => start,
            _ => return Ok(None),
        };
        if start.local_name().as_ref() != ALIAS_ELEMENT || !kinds.contains(&ComponentKind::Activity) {
            return Ok(None);
        }
        let value = attribute_value(start, TARGET_ACTIVITY_ATTRIBUTE)
            .map_err(|message| parse_error(&self.path, message))?;
        Ok(value.map(|value| (TARGET_ACTIVITY_ATTRIBUTE, value)))
    }

    fn with_attribute(
        &self,
        start: &BytesStart<'static>,
        local_name: &[u8],
        value: &str,
    ) -> Result<BytesStart<'static>> {
        let mut rewritten = start.clone();
        rewritten.clear_attributes();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| parse_error(&self.path, e))?;
            if attribute.key.local_name().as_ref() == local_name {
                let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                rewritten.push_attribute((key.as_str(), value));
            } else {
                rewritten.push_attribute(attribute);
            }
        }
        Ok(rewritten)
    }

    fn transform_error(&self, error: impl std::fmt::Display) -> ObfuscateError {
        ObfuscateError::ManifestTransform {
            path: self.path.clone(),
            message: error.to_string(),
        }
    }
}

/// Scans a manifest for components of the recognized kinds
#[derive(Debug, Clone)]
pub struct ManifestScanner {
    kinds: Vec<ComponentKind>,
}

impl Default for ManifestScanner {
    fn default() -> Self {
        Self::new(ComponentKind::ALL.to_vec())
    }
}

impl ManifestScanner {
    pub fn new(kinds: Vec<ComponentKind>) -> Self {
        Self { kinds }
    }

    pub fn kinds(&self) -> &[ComponentKind] {
        &self.kinds
    }

    /// Parse the manifest at `path`, build the mapping and rewrite the
    /// in-memory document. The file itself is not touched; call
    /// [`ManifestDocument::write`] on the outcome to persist it.
    pub fn scan(&self, path: &Path, ids: &mut dyn IdentifierSource) -> Result<ScanOutcome> {
        self.scan_extending(path, ids, &MappingTable::new())
    }

    /// Like [`scan`](Self::scan), but starting from the mapping of an
    /// earlier completed run. Its entries are kept, and components already
    /// carrying one of its opaque names are not renamed again.
    pub fn scan_extending(
        &self,
        path: &Path,
        ids: &mut dyn IdentifierSource,
        previous: &MappingTable,
    ) -> Result<ScanOutcome> {
        let document = ManifestDocument::load(path)?;
        self.scan_document_extending(document, ids, previous)
    }

    pub fn scan_document(
        &self,
        document: ManifestDocument,
        ids: &mut dyn IdentifierSource,
    ) -> Result<ScanOutcome> {
        self.scan_document_extending(document, ids, &MappingTable::new())
    }

    pub fn scan_document_extending(
        &self,
        mut document: ManifestDocument,
        ids: &mut dyn IdentifierSource,
        previous: &MappingTable,
    ) -> Result<ScanOutcome> {
        info!(
            "Scanning manifest {} (package {})",
            document.path().display(),
            document.package().unwrap_or("<none>")
        );
        let components = document.components(&self.kinds)?;

        let mut mapping = previous.clone();
        let mut taken: IndexMap<String, String> = previous
            .iter()
            .map(|(original, opaque)| (opaque.to_owned(), original.to_owned()))
            .collect();
        for component in &components {
            if previous.is_opaque(&component.qualified_name) {
                debug!("{} was renamed by an earlier run", component.qualified_name);
                continue;
            }
            if mapping.contains(&component.qualified_name) {
                debug!("{} is declared more than once", component.qualified_name);
                continue;
            }
            let package = package_of(&component.qualified_name);
            let opaque_simple = ids.next_identifier()?;
            let opaque = if package.is_empty() {
                opaque_simple
            } else {
                format!("{package}.{opaque_simple}")
            };
            if let Some(previous) = taken.insert(opaque.clone(), component.qualified_name.clone()) {
                warn!(
                    "Generated name {} for {} collides with the one for {}",
                    simple_name(&opaque),
                    component.qualified_name,
                    previous
                );
            }
            debug!("{} {} -> {}", component.kind, component.qualified_name, opaque);
            mapping.insert(component.qualified_name.clone(), opaque);
        }

        let rewritten = document.apply(&mapping, &self.kinds)?;
        info!(
            "Mapped {} components, {} new ({} manifest entries rewritten)",
            mapping.len(),
            mapping.len() - previous.len(),
            rewritten
        );
        Ok(ScanOutcome {
            document,
            mapping,
            components,
        })
    }
}

/// Unescaped value of the attribute whose local name is `local_name`
fn attribute_value(start: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>, String> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        if attribute.key.local_name().as_ref() == local_name {
            let value = attribute.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_error(path: &Path, message: impl std::fmt::Display) -> ObfuscateError {
    ObfuscateError::ManifestParse {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests;
