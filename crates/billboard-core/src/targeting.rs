//! Eligibility filter applied to a placement's candidate pool.

use std::collections::BTreeSet;

use crate::geo::matches_any;
use crate::roles::roles_eligible;
use crate::{Billboard, Geolocation, RoleName};

/// Who is asking for a billboard, as established by the request boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Option<i64>,
    pub roles: BTreeSet<RoleName>,
    /// High-precision location, only used for signed-in (uncached) responses.
    pub precise_geolocation: Option<Geolocation>,
    /// Coarsened location, the only one anonymous responses may vary on.
    pub cacheable_geolocation: Option<Geolocation>,
}

impl Viewer {
    #[must_use]
    pub fn signed_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// Location used for targeting.
    ///
    /// Anonymous responses are cached at the edge keyed on the coarse header,
    /// so they must not depend on the precise one.
    #[must_use]
    pub fn targeting_geolocation(&self) -> Option<&Geolocation> {
        if self.signed_in() {
            self.precise_geolocation.as_ref()
        } else {
            self.cacheable_geolocation.as_ref()
        }
    }
}

/// Whether `billboard` may be shown to `viewer`.
///
/// Approval and publish state are the caller's concern; this only checks
/// audience targeting.
#[must_use]
pub fn eligible(billboard: &Billboard, viewer: &Viewer) -> bool {
    if !billboard.display_to.admits(viewer.signed_in()) {
        return false;
    }

    if !roles_eligible(
        &viewer.roles,
        &billboard.target_role_names,
        &billboard.exclude_role_names,
    ) {
        return false;
    }

    if billboard.target_geolocations.is_empty() {
        return true;
    }
    viewer
        .targeting_geolocation()
        .is_some_and(|location| matches_any(&billboard.target_geolocations, location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billboards::test_billboard;
    use crate::DisplayTo;

    fn geo(code: &str) -> Geolocation {
        Geolocation::parse(code).unwrap()
    }

    fn anonymous_in(precise: &str, cacheable: &str) -> Viewer {
        Viewer {
            precise_geolocation: Some(geo(precise)),
            cacheable_geolocation: Some(geo(cacheable)),
            ..Viewer::default()
        }
    }

    #[test]
    fn display_to_logged_in_hides_from_anonymous() {
        let mut billboard = test_billboard(1);
        billboard.display_to = DisplayTo::LoggedIn;
        assert!(!eligible(&billboard, &Viewer::default()));

        let viewer = Viewer {
            user_id: Some(7),
            ..Viewer::default()
        };
        assert!(eligible(&billboard, &viewer));
    }

    #[test]
    fn role_targeting_is_applied() {
        let mut billboard = test_billboard(1);
        billboard.target_role_names = RoleName::set_from(["admin"]);
        let viewer = Viewer {
            user_id: Some(7),
            roles: RoleName::set_from(["editor"]),
            ..Viewer::default()
        };
        assert!(!eligible(&billboard, &viewer));
    }

    #[test]
    fn anonymous_viewers_are_targeted_on_the_cacheable_location() {
        let mut billboard = test_billboard(1);
        billboard.target_geolocations = vec![geo("US-CA")];

        // Precise header says California but the cacheable one only says US.
        let viewer = anonymous_in("US-CA", "US");
        assert!(!eligible(&billboard, &viewer));

        billboard.target_geolocations = vec![geo("US")];
        assert!(eligible(&billboard, &viewer));
    }

    #[test]
    fn signed_in_viewers_are_targeted_on_the_precise_location() {
        let mut billboard = test_billboard(1);
        billboard.target_geolocations = vec![geo("US-CA")];
        let viewer = Viewer {
            user_id: Some(3),
            ..anonymous_in("US-CA", "US")
        };
        assert!(eligible(&billboard, &viewer));
    }

    #[test]
    fn geo_targeted_billboard_needs_a_known_location() {
        let mut billboard = test_billboard(1);
        billboard.target_geolocations = vec![geo("CA")];
        assert!(!eligible(&billboard, &Viewer::default()));
    }

    #[test]
    fn untargeted_billboard_is_eligible_everywhere() {
        assert!(eligible(&test_billboard(1), &Viewer::default()));
        assert!(eligible(&test_billboard(1), &anonymous_in("CA-AB", "CA")));
    }
}
