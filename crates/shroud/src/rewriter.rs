//! Per-file textual substitution of component names
//!
//! Three passes run over the whole file, each independent of the others:
//!
//! 1. every original qualified name is replaced by its opaque qualified name;
//! 2. in a component's own file, its simple name is replaced by its opaque
//!    simple name;
//! 3. simple names made visible through the file's imports (and, when
//!    enabled, through its own package or wildcard imports) are replaced by
//!    their opaque simple names.
//!
//! Matching follows the configured [`MatchPolicy`]. Under
//! `MatchPolicy::Substring` any occurrence is replaced, including inside
//! longer identifiers, string literals and comments; rewriting the same file
//! twice is then not guaranteed to be a no-op. Under
//! `MatchPolicy::Identifier` only whole identifiers are replaced and a second
//! rewrite with the same mapping changes nothing.

use std::{borrow::Cow, path::Path};

use indexmap::IndexMap;
use log::debug;

use crate::{
    error::Result,
    mapping::{MappingTable, package_of, simple_name},
    matcher::MatchPolicy,
    resolver::SourceRoots,
    util::{read_source, write_atomic},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    Rewritten,
    Unchanged,
}

/// Options that change which references the rewriter recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOptions {
    pub policy: MatchPolicy,
    /// Components in the file's own package are visible without an import
    pub same_package: bool,
    /// `import pkg.*` makes every component of `pkg` visible
    pub wildcard_imports: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::Identifier,
            same_package: true,
            wildcard_imports: true,
        }
    }
}

impl RewriteOptions {
    /// Exactly the three passes and substring matching, with no implicit
    /// visibility rules
    pub fn compatible() -> Self {
        Self {
            policy: MatchPolicy::Substring,
            same_package: false,
            wildcard_imports: false,
        }
    }
}

#[derive(Debug)]
pub struct SourceRewriter<'a> {
    roots: &'a SourceRoots,
    options: RewriteOptions,
    /// Mapping entries, longest original name first
    entries: Vec<(&'a str, &'a str)>,
    mapping: &'a MappingTable,
}

impl<'a> SourceRewriter<'a> {
    pub fn new(mapping: &'a MappingTable, roots: &'a SourceRoots, options: RewriteOptions) -> Self {
        Self {
            roots,
            options,
            entries: mapping.entries_longest_first(),
            mapping,
        }
    }

    /// Rewrite the file at `path` in place. The file is only written when
    /// its content changes, and the write is atomic.
    pub fn rewrite_file(&self, path: &Path) -> Result<RewriteOutcome> {
        self.rewrite_path(path, true)
    }

    /// Report whether the file at `path` would change, without writing it
    pub fn preview_file(&self, path: &Path) -> Result<RewriteOutcome> {
        self.rewrite_path(path, false)
    }

    fn rewrite_path(&self, path: &Path, write: bool) -> Result<RewriteOutcome> {
        let declared = self.roots.declared_name(path);
        let content = read_source(path)?;
        let rewritten = self.rewrite_content(&content, declared.as_deref());
        if rewritten == content {
            return Ok(RewriteOutcome::Unchanged);
        }
        if write {
            write_atomic(path, rewritten.as_bytes())?;
            debug!("Rewrote {}", path.display());
        }
        Ok(RewriteOutcome::Rewritten)
    }

    /// Apply all passes to `content`. `declared` is the qualified name the
    /// file declares, derived from its original path.
    pub fn rewrite_content<'c>(&self, content: &'c str, declared: Option<&str>) -> Cow<'c, str> {
        let own = declared.and_then(|declared| {
            self.mapping
                .opaque_simple_name(declared)
                .map(|opaque| (simple_name(declared), opaque))
        });
        let aliases = self.local_aliases(content, declared, own);

        let mut text = Cow::Borrowed(content);
        for &(original, opaque) in &self.entries {
            text = self.replace(text, original, opaque);
        }
        if let Some((original, opaque)) = own {
            text = self.replace(text, original, opaque);
        }
        for (original, opaque) in aliases {
            text = self.replace(text, original, opaque);
        }
        text
    }

    /// File-local simple-name → opaque simple-name map, longest name first
    fn local_aliases<'s>(
        &'s self,
        content: &str,
        declared: Option<&str>,
        own: Option<(&'s str, &'s str)>,
    ) -> Vec<(&'s str, &'s str)> {
        let header = content.find('{').map_or(content, |brace| &content[..brace]);
        let imports: Vec<&str> = header
            .lines()
            .map(str::trim_start)
            .filter(|line| line.starts_with("import"))
            .collect();
        // simple names bound by explicit single-class imports
        let explicit: Vec<&str> = imports
            .iter()
            .copied()
            .filter_map(import_target)
            .filter(|target| !target.ends_with(".*"))
            .collect();

        let mut aliases: IndexMap<&'s str, &'s str> = IndexMap::new();
        for line in &imports {
            for &(original, opaque) in &self.entries {
                if self.options.policy.contains(line, original) {
                    aliases.insert(simple_name(original), simple_name(opaque));
                }
            }
            if self.options.wildcard_imports {
                if let Some(package) = wildcard_package(line) {
                    self.add_package(&mut aliases, package, &explicit);
                }
            }
        }

        if self.options.same_package {
            let package = package_statement(header)
                .or_else(|| declared.map(package_of))
                .unwrap_or_default();
            if !package.is_empty() {
                self.add_package(&mut aliases, package, &explicit);
            }
        }

        if let Some((original, opaque)) = own {
            aliases.insert(original, opaque);
        }

        let mut aliases: Vec<_> = aliases.into_iter().collect();
        aliases.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        aliases
    }

    /// Alias every component of `package`, unless an explicit import binds
    /// its simple name to some other class
    fn add_package<'s>(
        &'s self,
        aliases: &mut IndexMap<&'s str, &'s str>,
        package: &str,
        explicit: &[&str],
    ) {
        for &(original, opaque) in &self.entries {
            if package_of(original) != package {
                continue;
            }
            let simple = simple_name(original);
            let shadowed = explicit
                .iter()
                .any(|&target| simple_name(target) == simple && target != original);
            if shadowed {
                debug!("{original} is shadowed by an explicit import");
                continue;
            }
            aliases.insert(simple, simple_name(opaque));
        }
    }

    fn replace<'c>(&self, text: Cow<'c, str>, from: &str, to: &str) -> Cow<'c, str> {
        let replaced = match self.options.policy.replace_all(&text, from, to) {
            Cow::Owned(replaced) => Some(replaced),
            Cow::Borrowed(_) => None,
        };
        replaced.map_or(text, Cow::Owned)
    }
}

/// Package named by a `package` statement in the file header
fn package_statement(header: &str) -> Option<&str> {
    header.lines().map(str::trim).find_map(|line| {
        let rest = line.strip_prefix("package")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let package = rest.trim().trim_end_matches(';').trim_end();
        (!package.is_empty()).then_some(package)
    })
}

/// Imported name of an import line, without `static`, `;` or a Kotlin
/// `as` alias
fn import_target(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("import")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let rest = rest.strip_prefix("static ").unwrap_or(rest).trim_start();
    let target = rest
        .split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .filter(|target| !target.is_empty())?;
    Some(target)
}

/// Package of a wildcard import such as `import com.example.app.*;`
fn wildcard_package(line: &str) -> Option<&str> {
    import_target(line)?.strip_suffix(".*")
}
