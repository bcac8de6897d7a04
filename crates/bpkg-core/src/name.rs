//! Package name: a non-empty identifier with a canonical variable form.

use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A validated package name.
///
/// Names are case-sensitive, must start with an alphanumeric character and
/// may otherwise contain letters, digits, `+`, `.` and `-`. Every name also
/// has a *canonical variable form* (used when the skeleton evaluator exposes
/// the package as a `config.<name>.*` variable namespace): `-` and `.` are
/// replaced with `_`.
#[derive(Clone)]
pub struct PackageName {
    raw: Arc<str>,
}

impl PackageName {
    /// Parse and validate a package name.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidPackageName(s.to_string()));
        }
        let mut chars = s.chars();
        let first = chars.next().unwrap();
        if !first.is_ascii_alphanumeric() {
            return Err(Error::InvalidPackageName(s.to_string()));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-' | '_')) {
            return Err(Error::InvalidPackageName(s.to_string()));
        }
        Ok(Self { raw: Arc::from(s) })
    }

    /// The name as originally written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The canonical variable form: `-` and `.` replaced with `_`, used when
    /// this package name participates in a skeleton's configuration
    /// variable namespace (e.g. `config.<canonical>.enable`).
    #[must_use]
    pub fn canonical_variable(&self) -> String {
        self.raw
            .chars()
            .map(|c| if c == '-' || c == '.' { '_' } else { c })
            .collect()
    }

    /// A sentinel name denoting a user selection rather than a real
    /// dependent, used as the empty-name key in `required_by` sets (spec
    /// §3 build-package entry, `required_by`).
    #[must_use]
    pub fn command_line() -> Self {
        Self { raw: Arc::from("") }
    }

    /// Whether this is the `command_line` sentinel.
    #[must_use]
    pub fn is_command_line(&self) -> bool {
        self.raw.is_empty()
    }
}

impl fmt::Debug for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PackageName").field(&self.raw).finish()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(f, "<command line>")
        } else {
            write!(f, "{}", self.raw)
        }
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl Eq for PackageName {}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl std::str::FromStr for PackageName {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_names() {
        assert!(PackageName::parse("libfoo").is_ok());
        assert!(PackageName::parse("lib-foo.bar+baz").is_ok());
    }

    #[test]
    fn rejects_empty_and_bad_leading_char() {
        assert!(PackageName::parse("").is_err());
        assert!(PackageName::parse("-foo").is_err());
    }

    #[test]
    fn canonical_variable_form() {
        let n = PackageName::parse("lib-foo.bar").unwrap();
        assert_eq!(n.canonical_variable(), "lib_foo_bar");
    }

    #[test]
    fn command_line_sentinel_round_trips() {
        let cl = PackageName::command_line();
        assert!(cl.is_command_line());
        assert_eq!(cl.to_string(), "<command line>");
    }
}
