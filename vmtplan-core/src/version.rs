//! Server version handling and DTO flavor selection.
//!
//! The scenario request shape changed twice across Turbonomic releases:
//! 6.1 introduced the grouped `configChanges`/`topologyChanges` layout, and
//! 7.21 (XL) switched automation toggles to named actions with
//! `ENABLED`/`DISABLED` values. Servers older than 6.1 are not supported.

use regex::Regex;
use semver::Version;
use std::sync::OnceLock;

use crate::scenario::ScenarioError;

/// Oldest server release this client can build a scenario for.
pub const MIN_SUPPORTED: Version = Version::new(6, 1, 0);

const XL_FROM: Version = Version::new(7, 21, 0);
const SCOPE_DETAILS_UNTIL: Version = Version::new(7, 21, 5);

/// Request layout used when mapping a scenario to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtoFlavor {
    /// 6.1 up to 7.21: automation toggles keyed by setting code, boolean values.
    Classic,
    /// 7.21 and later: automation toggles keyed by action name, ENABLED/DISABLED values.
    Xl,
}

/// Strip pre-release and build metadata so `7.21.0-rc1` compares as `7.21.0`.
pub fn base_version(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch)
}

/// Pick the DTO flavor for a server version.
pub fn flavor_for(version: &Version) -> Result<DtoFlavor, ScenarioError> {
    let base = base_version(version);
    if base < MIN_SUPPORTED {
        return Err(ScenarioError::UnsupportedVersion(version.to_string()));
    }
    if base >= XL_FROM {
        Ok(DtoFlavor::Xl)
    } else {
        Ok(DtoFlavor::Classic)
    }
}

/// 7.21.0 through 7.21.4 reject scope entries that carry only a UUID.
pub fn needs_scope_details(version: &Version) -> bool {
    let base = base_version(version);
    base >= XL_FROM && base < SCOPE_DETAILS_UNTIL
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version pattern is valid")
    })
}

/// Extract the first `major.minor[.patch]` triple from a free-form version banner,
/// e.g. `"Turbonomic Operations Manager 8.3.1 (Build \"20210928\")"`.
pub fn parse_version_info(text: &str) -> Option<Version> {
    let caps = version_pattern().captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps
        .get(3)
        .map(|m| m.as_str().parse())
        .transpose()
        .ok()?
        .unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavor_boundaries() {
        assert!(flavor_for(&Version::new(5, 9, 3)).is_err());
        assert_eq!(flavor_for(&Version::new(6, 1, 0)).unwrap(), DtoFlavor::Classic);
        assert_eq!(flavor_for(&Version::new(7, 17, 2)).unwrap(), DtoFlavor::Classic);
        assert_eq!(flavor_for(&Version::new(7, 21, 0)).unwrap(), DtoFlavor::Xl);
        assert_eq!(flavor_for(&Version::new(8, 4, 0)).unwrap(), DtoFlavor::Xl);
    }

    #[test]
    fn prerelease_compares_as_base() {
        let v = Version::parse("7.21.0-rc1").unwrap();
        assert_eq!(flavor_for(&v).unwrap(), DtoFlavor::Xl);
        assert!(needs_scope_details(&v));
    }

    #[test]
    fn scope_detail_window() {
        assert!(!needs_scope_details(&Version::new(7, 17, 0)));
        assert!(needs_scope_details(&Version::new(7, 21, 0)));
        assert!(needs_scope_details(&Version::new(7, 21, 4)));
        assert!(!needs_scope_details(&Version::new(7, 21, 5)));
    }

    #[test]
    fn parses_version_banner() {
        let banner = "Turbonomic Operations Manager 8.3.1 (Build \"20210928\") \"2021-09-28\"";
        assert_eq!(parse_version_info(banner), Some(Version::new(8, 3, 1)));
        assert_eq!(parse_version_info("release 7.21"), Some(Version::new(7, 21, 0)));
        assert_eq!(parse_version_info("no version here"), None);
    }
}
