//! Name matching policies used by the source rewriter
//!
//! `Substring` replaces every occurrence of a name, including occurrences
//! inside longer identifiers, string literals and comments. `Identifier`
//! only replaces whole identifiers: the characters around a match must not
//! be identifier characters, and a match must not be preceded by `.`. A
//! name after a `.` is the tail of some qualified name, and qualified names
//! are matched whole.

use std::borrow::Cow;

use cow_utils::CowUtils;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Replace whole identifiers only
    #[default]
    Identifier,

    /// Replace every substring occurrence
    Substring,
}

impl MatchPolicy {
    /// Whether `needle` occurs in `haystack` under this policy
    pub fn contains(self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        match self {
            Self::Substring => haystack.contains(needle),
            Self::Identifier => identifier_matches(haystack, needle).next().is_some(),
        }
    }

    /// Replace every occurrence of `from` with `to`. Borrows `haystack` when
    /// nothing matched.
    pub fn replace_all<'a>(self, haystack: &'a str, from: &str, to: &str) -> Cow<'a, str> {
        if from.is_empty() {
            return Cow::Borrowed(haystack);
        }
        match self {
            Self::Substring => haystack.cow_replace(from, to),
            Self::Identifier => replace_identifiers(haystack, from, to),
        }
    }
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identifier => write!(f, "identifier"),
            Self::Substring => write!(f, "substring"),
        }
    }
}

/// Characters that may appear in a Java or Kotlin identifier
pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn identifier_matches<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack
        .match_indices(needle)
        .map(|(start, _)| start)
        .filter(move |&start| {
            let before = haystack[..start].chars().next_back();
            let after = haystack[start + needle.len()..].chars().next();
            before.is_none_or(|c| !is_identifier_char(c) && c != '.')
                && after.is_none_or(|c| !is_identifier_char(c))
        })
}

fn replace_identifiers<'a>(haystack: &'a str, from: &str, to: &str) -> Cow<'a, str> {
    let mut matches = identifier_matches(haystack, from).peekable();
    if matches.peek().is_none() {
        return Cow::Borrowed(haystack);
    }

    let mut result = String::with_capacity(haystack.len());
    let mut last = 0;
    for start in matches {
        result.push_str(&haystack[last..start]);
        result.push_str(to);
        last = start + from.len();
    }
    result.push_str(&haystack[last..]);
    Cow::Owned(result)
}
