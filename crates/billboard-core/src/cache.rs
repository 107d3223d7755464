//! Edge-cache directives for billboard selection responses.

/// Header carrying the cache-safe viewer location, coarsened by the gateway.
pub const CACHEABLE_GEO_HEADER: &str = "X-Cacheable-Client-Geo";
/// Header carrying the precise viewer location. Responses never vary on it.
pub const PRECISE_GEO_HEADER: &str = "X-Client-Geo";

/// How long an edge may serve a stale response when the origin errors.
pub const STALE_IF_ERROR_SECS: u64 = 86_400;
pub const STALE_WHILE_REVALIDATE_SECS: u64 = 30;
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 900;

/// Header name/value pairs to attach to a selection response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    headers: Vec<(&'static str, String)>,
}

impl CacheDirectives {
    fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.headers.push((name, value.into()));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.headers.iter().map(|(n, v)| (*n, v.as_str()))
    }
}

/// Derive cache directives from the selection outcome.
///
/// Signed-in responses are personalized and get no edge-cache headers at
/// all. Anonymous responses are cacheable, vary only on the coarse location,
/// and carry a surrogate key for the selected billboard so it can be purged.
#[must_use]
pub fn cache_directives(
    signed_in: bool,
    surrogate_key: Option<&str>,
    max_age_secs: u64,
) -> CacheDirectives {
    let mut directives = CacheDirectives::default();
    if signed_in {
        return directives;
    }

    directives.push("Cache-Control", "public, no-cache");
    directives.push(
        "Surrogate-Control",
        format!(
            "max-age={max_age_secs}, stale-while-revalidate={STALE_WHILE_REVALIDATE_SECS}, \
             stale-if-error={STALE_IF_ERROR_SECS}"
        ),
    );
    directives.push("X-Accel-Expires", max_age_secs.to_string());
    directives.push("Vary", CACHEABLE_GEO_HEADER);
    if let Some(key) = surrogate_key {
        directives.push("Surrogate-Key", key);
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_response_is_edge_cacheable() {
        let directives = cache_directives(false, Some("display_ads/12"), 900);
        assert_eq!(directives.get("Surrogate-Key"), Some("display_ads/12"));
        assert_eq!(directives.get("Vary"), Some("X-Cacheable-Client-Geo"));
        assert_eq!(directives.get("X-Accel-Expires"), Some("900"));
        assert_eq!(directives.get("Cache-Control"), Some("public, no-cache"));
        let surrogate_control = directives.get("Surrogate-Control").unwrap();
        assert!(surrogate_control.contains("max-age=900"));
        assert!(surrogate_control.contains("stale-if-error=86400"));
    }

    #[test]
    fn anonymous_response_never_varies_on_precise_geo() {
        let directives = cache_directives(false, Some("display_ads/12"), 900);
        assert!(directives
            .iter()
            .all(|(_, value)| !value.split(',').any(|v| v.trim() == PRECISE_GEO_HEADER)));
    }

    #[test]
    fn anonymous_response_without_billboard_has_no_surrogate_key() {
        let directives = cache_directives(false, None, 900);
        assert!(directives.get("Surrogate-Key").is_none());
        assert_eq!(directives.get("Vary"), Some("X-Cacheable-Client-Geo"));
    }

    #[test]
    fn signed_in_response_is_not_edge_cached() {
        let directives = cache_directives(true, Some("display_ads/12"), 900);
        assert!(directives.is_empty());
        assert!(directives.get("Surrogate-Key").is_none());
        assert!(directives.get("Cache-Control").is_none());
        assert!(directives.get("Vary").is_none());
    }
}
