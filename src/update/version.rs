//! Version string comparison
//!
//! Accepts dot-separated numeric versions with an optional leading `v`, a
//! pre-release suffix (`1.2.0-beta.1`, `1.2.0rc1`) and build metadata
//! (`+sha.abc`, ignored). Missing trailing components count as zero and a
//! pre-release sorts below the same numeric version without one.

use crate::core::error::{Result, UpdateError};
use std::cmp::Ordering;

/// Parsed form of a version string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    pub components: Vec<u64>,
    pub prerelease: Option<String>,
}

impl ParsedVersion {
    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let without_v = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        // Build metadata never takes part in ordering
        let without_build = match without_v.find('+') {
            Some(idx) => &without_v[..idx],
            None => without_v,
        };

        let prefix_len = without_build
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(without_build.len());
        let (numeric, suffix) = without_build.split_at(prefix_len);

        let mut components = Vec::new();
        for part in numeric.split('.').filter(|p| !p.is_empty()) {
            let value = part.parse::<u64>().map_err(|_| {
                UpdateError::InvalidVersionFormat(format!(
                    "component '{}' of '{}' is out of range",
                    part, input
                ))
            })?;
            components.push(value);
        }

        if components.is_empty() {
            return Err(UpdateError::InvalidVersionFormat(format!(
                "no numeric component in '{}'",
                input
            )));
        }

        let suffix = suffix.trim_start_matches(['-', '.', '_']);
        let prerelease = if suffix.is_empty() {
            None
        } else {
            Some(suffix.to_string())
        };

        Ok(Self {
            components,
            prerelease,
        })
    }

    fn component(&self, idx: usize) -> u64 {
        self.components.get(idx).copied().unwrap_or(0)
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for idx in 0..len {
            match self.component(idx).cmp(&other.component(idx)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare pre-release tags identifier by identifier
///
/// Numeric identifiers compare numerically and sort below alphanumeric ones;
/// a tag that is a prefix of another sorts first.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_identifier(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_identifier(a: &str, b: &str) -> Ordering {
    let a_numeric = !a.is_empty() && a.bytes().all(|c| c.is_ascii_digit());
    let b_numeric = !b.is_empty() && b.bytes().all(|c| c.is_ascii_digit());

    match (a_numeric, b_numeric) {
        (true, true) => {
            // Compare without parsing so arbitrarily long numbers cannot overflow
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

/// Pure comparison of version strings
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionComparator;

impl VersionComparator {
    /// Compare `a` against `b`
    ///
    /// Fails with [`UpdateError::InvalidVersionFormat`] when either side has
    /// no parsable numeric component.
    pub fn compare(a: &str, b: &str) -> Result<Ordering> {
        let a = ParsedVersion::parse(a)?;
        let b = ParsedVersion::parse(b)?;
        Ok(a.cmp(&b))
    }

    /// True when `candidate` is strictly newer than `current`
    pub fn is_newer(candidate: &str, current: &str) -> Result<bool> {
        Ok(Self::compare(candidate, current)? == Ordering::Greater)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let v = ParsedVersion::parse("1.2.3").unwrap();
        assert_eq!(v.components, vec![1, 2, 3]);
        assert_eq!(v.prerelease, None);
    }

    #[test]
    fn test_parse_with_prefix_and_suffix() {
        let v = ParsedVersion::parse("  v2.0.0-beta.1+build.7 ").unwrap();
        assert_eq!(v.components, vec![2, 0, 0]);
        assert_eq!(v.prerelease.as_deref(), Some("beta.1"));

        let v = ParsedVersion::parse("V3.1rc2").unwrap();
        assert_eq!(v.components, vec![3, 1]);
        assert_eq!(v.prerelease.as_deref(), Some("rc2"));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        for input in ["dev", "", "v", "beta-1.0", "+1.2"] {
            let err = ParsedVersion::parse(input).unwrap_err();
            assert!(
                matches!(err, UpdateError::InvalidVersionFormat(_)),
                "expected InvalidVersionFormat for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let err = ParsedVersion::parse("99999999999999999999999.1").unwrap_err();
        assert!(matches!(err, UpdateError::InvalidVersionFormat(_)));
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert_eq!(
            VersionComparator::compare("1.2.0", "1.10.0").unwrap(),
            Ordering::Less
        );
        assert_eq!(
            VersionComparator::compare("1.10.0", "1.9.9").unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_trailing_zero_padding() {
        assert_eq!(VersionComparator::compare("1.0", "1.0.0").unwrap(), Ordering::Equal);
        assert_eq!(VersionComparator::compare("2", "2.0.0.0").unwrap(), Ordering::Equal);
        assert_eq!(VersionComparator::compare("1.0.1", "1").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_leading_v_is_ignored() {
        assert_eq!(VersionComparator::compare("v1.4.0", "1.4.0").unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_prerelease_sorts_lower() {
        assert_eq!(
            VersionComparator::compare("1.0.0-beta", "1.0.0").unwrap(),
            Ordering::Less
        );
        assert_eq!(
            VersionComparator::compare("1.0.1-alpha", "1.0.0").unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_prerelease_identifiers() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
        ];
        for pair in ordered.windows(2) {
            assert_eq!(
                VersionComparator::compare(pair[0], pair[1]).unwrap(),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_build_metadata_ignored() {
        assert_eq!(
            VersionComparator::compare("1.2.3+abc", "1.2.3+def").unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_is_newer() {
        assert!(VersionComparator::is_newer("1.1.0", "1.0.9").unwrap());
        assert!(!VersionComparator::is_newer("1.0.0", "1.0.0").unwrap());
        assert!(VersionComparator::is_newer("dev", "1.0.0").is_err());
    }
}
