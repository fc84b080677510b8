//! Ordering of version names.
//!
//! Numeric segments compare as integers so `10.0.0` sorts above `2.0.0`. A release
//! sorts above its own pre-releases; pre-release identifiers compare numerically
//! when both sides are numeric and lexically otherwise.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl Ord for Identifier<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Text(_)) => Ordering::Less,
            (Identifier::Text(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Text(a), Identifier::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key for a version name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionKey<'a> {
    release: Vec<Identifier<'a>>,
    pre: Vec<Identifier<'a>>,
}

impl<'a> VersionKey<'a> {
    pub fn parse(name: &'a str) -> Self {
        let (release, pre) = match name.split_once('-') {
            Some((release, pre)) => (release, Some(pre)),
            None => (name, None),
        };
        Self {
            release: release.split('.').map(identifier).collect(),
            pre: pre
                .map(|pre| pre.split('.').map(identifier).collect())
                .unwrap_or_default(),
        }
    }
}

fn identifier(segment: &str) -> Identifier<'_> {
    segment
        .parse::<u64>()
        .map(Identifier::Numeric)
        .unwrap_or(Identifier::Text(segment))
}

impl Ord for VersionKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release
            .cmp(&other.release)
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for VersionKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::parse(a).cmp(&VersionKey::parse(b))
}

/// Sort newest first
pub fn sort_newest_first<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| compare_versions(name(b), name(a)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_not_lexicographic() {
        assert_eq!(compare_versions("10.0.0", "2.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.10", "1.0.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.2.3", "1.2.3"), Ordering::Equal);
    }

    #[test]
    fn test_release_above_prerelease() {
        assert_eq!(compare_versions("1.0.2", "1.0.2-a.1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.2-a.2", "1.0.2-a.10"), Ordering::Less);
        assert_eq!(compare_versions("1.0.2-beta", "1.0.2-alpha"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.3-a", "1.0.2"), Ordering::Greater);
    }

    #[test]
    fn test_longer_release_sorts_higher() {
        assert_eq!(compare_versions("1.0.0.1", "1.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_sort_newest_first() {
        let mut names = vec!["2.0.0", "10.0.0", "1.0.0-rc.1", "1.0.0"];
        sort_newest_first(&mut names, |n| *n);
        assert_eq!(names, vec!["10.0.0", "2.0.0", "1.0.0", "1.0.0-rc.1"]);
    }
}
