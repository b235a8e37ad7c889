//! Minimal Kubernetes version handling.
//!
//! Only ordering and major/minor comparisons are needed here; build metadata
//! and pre-release tags never appear in the fields this provider reads.

use crate::ScopeError;

/// A parsed `v<major>.<minor>.<patch>` version. The leading `v` is optional.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct KubernetesVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl KubernetesVersion {
    pub fn parse(raw: &str) -> Result<Self, ScopeError> {
        let err = || ScopeError::InvalidVersion(raw.to_string());

        let trimmed = raw.strip_prefix('v').unwrap_or(raw);
        let mut parts = trimmed.splitn(3, '.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let patch = match parts.next() {
            Some(p) => p.parse().map_err(|_| err())?,
            None => 0,
        };
        Ok(Self { major, minor, patch })
    }

    /// True when this version is at least `major.minor`.
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// The version without its `v` prefix, as Azure APIs expect it.
    pub fn azure_form(raw: &str) -> &str {
        raw.strip_prefix('v').unwrap_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("v1.22.0", 1, 22, 0)]
    #[case("1.21.1", 1, 21, 1)]
    #[case("v1.30", 1, 30, 0)]
    fn parses(#[case] raw: &str, #[case] major: u32, #[case] minor: u32, #[case] patch: u32) {
        assert_eq!(
            KubernetesVersion::parse(raw).unwrap(),
            KubernetesVersion { major, minor, patch }
        );
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "v", "one.two", "v1", "v1..2"] {
            assert!(KubernetesVersion::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn ordering() {
        let old = KubernetesVersion::parse("v1.20.1").unwrap();
        let new = KubernetesVersion::parse("v1.21.1").unwrap();
        assert!(new > old);
        assert!(new.at_least(1, 21));
        assert!(!old.at_least(1, 21));
        assert_eq!(KubernetesVersion::azure_form("v1.21.1"), "1.21.1");
    }
}
