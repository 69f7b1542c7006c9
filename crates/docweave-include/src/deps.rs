//! Dependency tracking for rendered documents.

use std::collections::BTreeSet;

/// Canonical store paths read while producing one rendered document.
///
/// Each path appears once regardless of how many times it was included.
/// Iteration is in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    paths: BTreeSet<String>,
}

impl DependencySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path. Returns `false` if it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.paths.insert(path.into())
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Merge another set into this one.
    pub fn extend(&mut self, other: DependencySet) {
        self.paths.extend(other.paths);
    }

    /// Whether any of `changed` is a dependency.
    pub fn is_affected_by<'a>(&self, changed: impl IntoIterator<Item = &'a str>) -> bool {
        changed.into_iter().any(|path| self.contains(path))
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for DependencySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates() {
        let mut deps = DependencySet::new();

        assert!(deps.insert("a.adoc"));
        assert!(!deps.insert("a.adoc"));
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_iterates_sorted() {
        let deps: DependencySet = ["b.adoc", "a.adoc", "c/d.puml"].into_iter().collect();

        assert_eq!(
            deps.iter().collect::<Vec<_>>(),
            vec!["a.adoc", "b.adoc", "c/d.puml"]
        );
    }

    #[test]
    fn test_is_affected_by() {
        let deps: DependencySet = ["index.adoc", "part.adoc"].into_iter().collect();

        assert!(deps.is_affected_by(["other.adoc", "part.adoc"]));
        assert!(!deps.is_affected_by(["other.adoc"]));
        assert!(!deps.is_affected_by([]));
    }

    #[test]
    fn test_extend() {
        let mut deps: DependencySet = ["a"].into_iter().collect();
        deps.extend(["a", "b"].into_iter().collect());

        assert_eq!(deps.len(), 2);
        assert!(deps.contains("b"));
    }
}
