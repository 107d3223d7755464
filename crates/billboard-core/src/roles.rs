//! Role names and the role matcher.

use std::collections::BTreeSet;

use serde::{Serialize, Serializer};

/// A lowercase, trimmed role name such as `admin` or `trusted`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleName(String);

impl RoleName {
    /// Normalize a raw role name. Returns `None` for blank input.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let name = raw.trim().to_lowercase();
        (!name.is_empty()).then_some(Self(name))
    }

    /// Build a set from any iterator of raw names, dropping blanks.
    pub fn set_from<I, S>(raw: I) -> BTreeSet<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .filter_map(|name| Self::new(name.as_ref()))
            .collect()
    }

    /// Build a set from a comma-separated header or form value.
    #[must_use]
    pub fn set_from_csv(raw: &str) -> BTreeSet<Self> {
        Self::set_from(raw.split(','))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RoleName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Exclusions win over targets; empty sets impose no restriction.
#[must_use]
pub fn roles_eligible(
    viewer_roles: &BTreeSet<RoleName>,
    target: &BTreeSet<RoleName>,
    exclude: &BTreeSet<RoleName>,
) -> bool {
    if !exclude.is_empty() && !exclude.is_disjoint(viewer_roles) {
        return false;
    }
    if !target.is_empty() && target.is_disjoint(viewer_roles) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<RoleName> {
        RoleName::set_from(names)
    }

    #[test]
    fn target_intersecting_viewer_roles_is_eligible() {
        assert!(roles_eligible(
            &set(&["editor", "moderator"]),
            &set(&["editor"]),
            &set(&[]),
        ));
    }

    #[test]
    fn exclusion_intersecting_viewer_roles_is_ineligible() {
        assert!(!roles_eligible(
            &set(&["editor", "moderator"]),
            &set(&[]),
            &set(&["moderator"]),
        ));
    }

    #[test]
    fn target_without_intersection_is_ineligible() {
        assert!(!roles_eligible(&set(&["editor"]), &set(&["admin"]), &set(&[])));
    }

    #[test]
    fn both_sets_empty_is_eligible() {
        assert!(roles_eligible(&set(&[]), &set(&[]), &set(&[])));
        assert!(roles_eligible(&set(&["editor"]), &set(&[]), &set(&[])));
    }

    #[test]
    fn exclusion_without_intersection_is_eligible() {
        assert!(roles_eligible(&set(&["editor"]), &set(&[]), &set(&["admin"])));
    }

    #[test]
    fn exclusion_takes_precedence_over_target() {
        assert!(!roles_eligible(
            &set(&["editor"]),
            &set(&["editor"]),
            &set(&["editor"]),
        ));
    }

    #[test]
    fn names_are_normalized() {
        let roles = RoleName::set_from_csv(" Admin, ,TRUSTED ");
        assert_eq!(roles, set(&["admin", "trusted"]));
        assert!(RoleName::new("   ").is_none());
    }
}
