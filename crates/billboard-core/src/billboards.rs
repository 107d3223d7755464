use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, Geolocation, RoleName};

/// Named location on the site where a billboard may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementArea {
    SidebarLeft,
    #[serde(rename = "sidebar_left_2")]
    SidebarLeft2,
    SidebarRight,
    SidebarRightSecond,
    SidebarRightThird,
    FeedFirst,
    FeedSecond,
    FeedThird,
    HomeHero,
    Footer,
    PageFixedBottom,
    PostFixedBottom,
    PostBodyBottom,
    PostSidebar,
    PostComments,
    PostCommentsMid,
    DigestFirst,
    DigestSecond,
}

impl PlacementArea {
    pub const ALL: [PlacementArea; 18] = [
        PlacementArea::SidebarLeft,
        PlacementArea::SidebarLeft2,
        PlacementArea::SidebarRight,
        PlacementArea::SidebarRightSecond,
        PlacementArea::SidebarRightThird,
        PlacementArea::FeedFirst,
        PlacementArea::FeedSecond,
        PlacementArea::FeedThird,
        PlacementArea::HomeHero,
        PlacementArea::Footer,
        PlacementArea::PageFixedBottom,
        PlacementArea::PostFixedBottom,
        PlacementArea::PostBodyBottom,
        PlacementArea::PostSidebar,
        PlacementArea::PostComments,
        PlacementArea::PostCommentsMid,
        PlacementArea::DigestFirst,
        PlacementArea::DigestSecond,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlacementArea::SidebarLeft => "sidebar_left",
            PlacementArea::SidebarLeft2 => "sidebar_left_2",
            PlacementArea::SidebarRight => "sidebar_right",
            PlacementArea::SidebarRightSecond => "sidebar_right_second",
            PlacementArea::SidebarRightThird => "sidebar_right_third",
            PlacementArea::FeedFirst => "feed_first",
            PlacementArea::FeedSecond => "feed_second",
            PlacementArea::FeedThird => "feed_third",
            PlacementArea::HomeHero => "home_hero",
            PlacementArea::Footer => "footer",
            PlacementArea::PageFixedBottom => "page_fixed_bottom",
            PlacementArea::PostFixedBottom => "post_fixed_bottom",
            PlacementArea::PostBodyBottom => "post_body_bottom",
            PlacementArea::PostSidebar => "post_sidebar",
            PlacementArea::PostComments => "post_comments",
            PlacementArea::PostCommentsMid => "post_comments_mid",
            PlacementArea::DigestFirst => "digest_first",
            PlacementArea::DigestSecond => "digest_second",
        }
    }

    /// Label shown to billboard authors.
    #[must_use]
    pub fn human_readable(self) -> &'static str {
        match self {
            PlacementArea::SidebarLeft => "Sidebar Left (First Position)",
            PlacementArea::SidebarLeft2 => "Sidebar Left (Second Position)",
            PlacementArea::SidebarRight => "Sidebar Right (Home first position)",
            PlacementArea::SidebarRightSecond => "Sidebar Right (Home second position)",
            PlacementArea::SidebarRightThird => "Sidebar Right (Home third position)",
            PlacementArea::FeedFirst => "Home Feed First",
            PlacementArea::FeedSecond => "Home Feed Second",
            PlacementArea::FeedThird => "Home Feed Third",
            PlacementArea::HomeHero => "Home Hero",
            PlacementArea::Footer => "Footer",
            PlacementArea::PageFixedBottom => "Fixed Bottom (Page)",
            PlacementArea::PostFixedBottom => "Fixed Bottom (Individual Post)",
            PlacementArea::PostBodyBottom => "Below the post body",
            PlacementArea::PostSidebar => "Sidebar Right (Individual Post)",
            PlacementArea::PostComments => "Below the comment section",
            PlacementArea::PostCommentsMid => "Midway through the comment section",
            PlacementArea::DigestFirst => "Digest Email First",
            PlacementArea::DigestSecond => "Digest Email Second",
        }
    }
}

impl std::fmt::Display for PlacementArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlacementArea {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlacementArea::ALL
            .into_iter()
            .find(|area| area.as_str() == s)
            .ok_or_else(|| CoreError::validation("placement_area", s))
    }
}

/// Which sign-in state a billboard is shown to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayTo {
    All,
    LoggedIn,
    LoggedOut,
}

impl DisplayTo {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayTo::All => "all",
            DisplayTo::LoggedIn => "logged_in",
            DisplayTo::LoggedOut => "logged_out",
        }
    }

    #[must_use]
    pub fn admits(self, signed_in: bool) -> bool {
        match self {
            DisplayTo::All => true,
            DisplayTo::LoggedIn => signed_in,
            DisplayTo::LoggedOut => !signed_in,
        }
    }
}

impl std::str::FromStr for DisplayTo {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DisplayTo::All),
            "logged_in" => Ok(DisplayTo::LoggedIn),
            "logged_out" => Ok(DisplayTo::LoggedOut),
            other => Err(CoreError::validation("display_to", other)),
        }
    }
}

/// A billboard as seen by targeting and selection.
///
/// Role and geolocation sets are already normalized; see [`RoleName`] and
/// [`Geolocation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Billboard {
    pub id: i64,
    pub name: Option<String>,
    pub placement_area: PlacementArea,
    pub display_to: DisplayTo,
    pub target_role_names: BTreeSet<RoleName>,
    pub exclude_role_names: BTreeSet<RoleName>,
    pub target_geolocations: Vec<Geolocation>,
    pub approved: bool,
    pub published: bool,
    pub priority: bool,
    pub weight: i32,
    pub processed_html: Option<String>,
    pub impressions_count: i64,
    pub clicks_count: i64,
    pub success_rate: f64,
    pub counts_tabulated_at: Option<DateTime<Utc>>,
}

impl Billboard {
    /// Key used to purge this billboard from the edge cache.
    #[must_use]
    pub fn surrogate_key(&self) -> String {
        format!("display_ads/{}", self.id)
    }
}

#[cfg(test)]
pub(crate) fn test_billboard(id: i64) -> Billboard {
    Billboard {
        id,
        name: Some(format!("Billboard {id}")),
        placement_area: PlacementArea::PostComments,
        display_to: DisplayTo::All,
        target_role_names: BTreeSet::new(),
        exclude_role_names: BTreeSet::new(),
        target_geolocations: Vec::new(),
        approved: true,
        published: true,
        priority: false,
        weight: 1,
        processed_html: None,
        impressions_count: 0,
        clicks_count: 0,
        success_rate: 0.0,
        counts_tabulated_at: None,
    }
}
