//! Which nodes an alert is meant for.
//!
//! An alert targets an inclusive protocol version range and either every
//! client or an explicit set of client subversions (BIP14 names such as
//! `nodenet:0.9.3`). Operators write the entries joined by
//! `/` and wrapped in `/`, e.g. `/nodenet:0.9.2/nodenet:0.9.3/`.

use crate::constants::alert::SUBVERSION_SEPARATOR;
use crate::error::AlertError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::codec::UnsignedAlert;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubversionTargets {
    /// Every client
    #[default]
    Universal,
    /// Only clients reporting exactly one of these subversions
    Only(BTreeSet<String>),
}

impl SubversionTargets {
    /// Parse operator syntax. Empty means every client.
    pub fn parse(spec: &str) -> Result<Self, AlertError> {
        if spec.is_empty() {
            return Ok(SubversionTargets::Universal);
        }

        let inner = spec
            .strip_prefix(SUBVERSION_SEPARATOR)
            .and_then(|s| s.strip_suffix(SUBVERSION_SEPARATOR))
            .ok_or_else(|| AlertError::MalformedSubversionSpec(spec.to_string()))?;

        let mut entries = BTreeSet::new();
        for entry in inner.split(SUBVERSION_SEPARATOR) {
            if entry.is_empty() {
                return Err(AlertError::MalformedSubversionSpec(spec.to_string()));
            }
            entries.insert(entry.to_string());
        }
        Ok(SubversionTargets::Only(entries))
    }

    pub fn contains(&self, sub_version: &str) -> bool {
        match self {
            SubversionTargets::Universal => true,
            SubversionTargets::Only(entries) => entries.contains(sub_version),
        }
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, SubversionTargets::Universal)
    }

    /// Human readable form used in RPC output: "" for every client,
    /// otherwise the entries joined with " or "
    pub fn render(&self) -> String {
        match self {
            SubversionTargets::Universal => String::new(),
            SubversionTargets::Only(entries) => entries
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

pub fn parse_subversion_spec(spec: &str) -> Result<SubversionTargets, AlertError> {
    SubversionTargets::parse(spec)
}

/// True iff the alert covers `local_version` and `local_sub_version`.
pub fn applies_to(alert: &UnsignedAlert, local_version: i32, local_sub_version: &str) -> bool {
    alert.min_ver <= local_version
        && local_version <= alert.max_ver
        && alert.sub_versions.contains(local_sub_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> SubversionTargets {
        SubversionTargets::Only(items.iter().map(|s| s.to_string()).collect())
    }

    fn alert(min_ver: i32, max_ver: i32, sub_versions: SubversionTargets) -> UnsignedAlert {
        UnsignedAlert {
            version: 70010,
            relay_until: 0,
            expiration: 0,
            id: 1,
            cancel: 0,
            set_cancel: BTreeSet::new(),
            min_ver,
            max_ver,
            sub_versions,
            priority: 1,
            comment: String::new(),
            status_bar: "test".to_string(),
            reserved: String::new(),
        }
    }

    #[test]
    fn test_parse_empty_is_universal() {
        assert_eq!(parse_subversion_spec("").unwrap(), SubversionTargets::Universal);
    }

    #[test]
    fn test_parse_multiple_entries() {
        assert_eq!(parse_subversion_spec("/a/b/c/").unwrap(), set(&["a", "b", "c"]));
        assert_eq!(
            parse_subversion_spec("/node:1.0.0/").unwrap(),
            set(&["node:1.0.0"])
        );
        // Duplicates collapse
        assert_eq!(parse_subversion_spec("/a/a/").unwrap(), set(&["a"]));
    }

    #[test]
    fn test_parse_rejects_unbounded() {
        for bad in ["a/b/", "/a/b", "node:1.0.0", "/", "//", "/a//b/"] {
            assert!(
                matches!(
                    parse_subversion_spec(bad),
                    Err(AlertError::MalformedSubversionSpec(_))
                ),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(SubversionTargets::Universal.render(), "");
        assert_eq!(set(&["b", "a"]).render(), "a or b");
    }

    #[test]
    fn test_universal_depends_only_on_version_range() {
        let universal = alert(70000, 70010, SubversionTargets::Universal);
        for sub_version in ["", "nodenet:0.9.3", "other:1.0.0", "/weird/", "x y z"] {
            assert!(applies_to(&universal, 70000, sub_version), "{:?}", sub_version);
            assert!(applies_to(&universal, 70005, sub_version), "{:?}", sub_version);
            assert!(applies_to(&universal, 70010, sub_version), "{:?}", sub_version);
            assert!(!applies_to(&universal, 69999, sub_version), "{:?}", sub_version);
            assert!(!applies_to(&universal, 70011, sub_version), "{:?}", sub_version);
        }
    }

    #[test]
    fn test_version_bounds_are_inclusive() {
        let targeted = alert(70000, 70010, set(&["nodenet:0.9.3"]));
        assert!(applies_to(&targeted, 70000, "nodenet:0.9.3"));
        assert!(applies_to(&targeted, 70010, "nodenet:0.9.3"));
        assert!(!applies_to(&targeted, 69999, "nodenet:0.9.3"));
        assert!(!applies_to(&targeted, 70011, "nodenet:0.9.3"));
        assert!(!applies_to(&targeted, 70000, "nodenet:0.9.2"));

        let single = alert(70005, 70005, SubversionTargets::Universal);
        assert!(applies_to(&single, 70005, "anything"));
        assert!(!applies_to(&single, 70004, "anything"));
        assert!(!applies_to(&single, 70006, "anything"));
    }

    #[test]
    fn test_membership_is_exact() {
        let targets = set(&["node:1.0.0"]);
        assert!(targets.contains("node:1.0.0"));
        assert!(!targets.contains("node:1.0"));
        assert!(!targets.contains("/node:1.0.0/"));
    }
}
