//! Viewer context from headers set by the trusted edge gateway.

use axum::http::HeaderMap;
use billboard_core::cache::{CACHEABLE_GEO_HEADER, PRECISE_GEO_HEADER};
use billboard_core::{Geolocation, RoleName, Viewer};

/// Present (and numeric) only for signed-in viewers.
pub(super) const VIEWER_ID_HEADER: &str = "x-viewer-id";
/// Comma-separated role names of the signed-in viewer.
pub(super) const VIEWER_ROLES_HEADER: &str = "x-viewer-roles";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub(super) fn viewer_id(headers: &HeaderMap) -> Option<i64> {
    header_str(headers, VIEWER_ID_HEADER).and_then(|v| v.trim().parse().ok())
}

/// Precise location of the request, for storing on events.
pub(super) fn precise_geolocation(headers: &HeaderMap) -> Option<Geolocation> {
    Geolocation::from_header(header_str(headers, PRECISE_GEO_HEADER))
}

pub(super) fn viewer_from_headers(headers: &HeaderMap) -> Viewer {
    let user_id = viewer_id(headers);
    let roles = match (user_id, header_str(headers, VIEWER_ROLES_HEADER)) {
        (Some(_), Some(raw)) => RoleName::set_from_csv(raw),
        _ => Default::default(),
    };
    // Already coarsened by the gateway; the edge cache varies on this exact value.
    let cacheable_geolocation = Geolocation::from_header(header_str(headers, CACHEABLE_GEO_HEADER));

    Viewer {
        user_id,
        roles,
        precise_geolocation: precise_geolocation(headers),
        cacheable_geolocation,
    }
}
