//! Reload filtering.
//!
//! Decides whether a changed file should trigger a reload, based on the
//! project's filter patterns. Paths are matched relative to the project root
//! with `/` separators on every platform, so one set of patterns works
//! everywhere.

use std::borrow::Cow;
use std::path::{Component, Path};

use regex::Regex;

use crate::error::PatternError;

/// Ordered set of patterns that suppress reload notifications.
///
/// A change is suppressed if its relative path matches any pattern. An empty
/// set suppresses nothing.
#[derive(Clone, Debug, Default)]
pub struct FilterPatternSet {
    patterns: Vec<Regex>,
}

impl FilterPatternSet {
    /// Compile a pattern set from regular expression sources.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for the first pattern that fails to compile.
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let source = p.as_ref();
                Regex::new(source).map_err(|e| PatternError::new(source, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Build a pattern set from already compiled expressions.
    #[must_use]
    pub fn from_regexes(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns `true` if no pattern matches `relative_path`.
    #[must_use]
    pub fn should_trigger(&self, relative_path: &str) -> bool {
        !self.patterns.iter().any(|p| p.is_match(relative_path))
    }
}

/// Express `path` relative to `root`, joined with `/`.
///
/// An empty path yields an empty string. Relative paths are taken as already
/// relative to `root`. Paths outside `root` climb out with `..` segments.
pub(crate) fn relative_to(root: &Path, path: &Path) -> String {
    if path.as_os_str().is_empty() {
        return String::new();
    }

    let root = absolutize(root);
    let joined;
    let path = if path.is_absolute() {
        path
    } else {
        joined = root.join(path);
        &joined
    };

    let root: Vec<Component<'_>> = normalized(&root);
    let target: Vec<Component<'_>> = normalized(path);

    let common = root
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let ups = std::iter::repeat_n("..".to_owned(), root.len() - common);
    let downs = target[common..]
        .iter()
        .map(|c| c.as_os_str().to_string_lossy().into_owned());

    ups.chain(downs).collect::<Vec<_>>().join("/")
}

/// Anchor a relative root at the current directory so it lines up with
/// absolute watcher paths.
fn absolutize(root: &Path) -> Cow<'_, Path> {
    if root.is_absolute() {
        return Cow::Borrowed(root);
    }
    std::path::absolute(root).map_or(Cow::Borrowed(root), Cow::Owned)
}

/// Components with `.` dropped and `..` folded into the preceding segment.
fn normalized(path: &Path) -> Vec<Component<'_>> {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}
