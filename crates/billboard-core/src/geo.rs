//! ISO 3166 location codes and the geolocation matcher.

use serde::{Serialize, Serializer};

use crate::CoreError;

/// A normalized location code: a two-letter country with an optional
/// subdivision, e.g. `CA` or `US-CA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Geolocation {
    country: String,
    region: Option<String>,
}

impl Geolocation {
    /// Parse and normalize a code such as `" us-ca "`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when the country is not two ASCII
    /// letters or the region is not 1-3 ASCII alphanumerics.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let code = raw.trim().to_ascii_uppercase();
        let (country, region) = match code.split_once('-') {
            Some((country, region)) => (country, Some(region)),
            None => (code.as_str(), None),
        };

        let country_ok = country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic());
        let region_ok = region.is_none_or(|r| {
            (1..=3).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
        });
        if !country_ok || !region_ok {
            return Err(CoreError::validation("geolocation", raw.trim()));
        }

        Ok(Self {
            country: country.to_string(),
            region: region.map(str::to_string),
        })
    }

    /// Parse a comma-separated list (`"US-CA, CA-ON"`). Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first invalid code as [`CoreError::Validation`].
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, CoreError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Lenient parse for values coming from request headers: malformed codes
    /// are treated as an unknown location.
    #[must_use]
    pub fn from_header(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        Self::parse(raw).ok()
    }

    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    #[must_use]
    pub fn to_iso3166(&self) -> String {
        match &self.region {
            Some(region) => format!("{}-{region}", self.country),
            None => self.country.clone(),
        }
    }
}

impl std::fmt::Display for Geolocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso3166())
    }
}

impl Serialize for Geolocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso3166())
    }
}

/// Returns `true` when `viewer` falls inside any of `targets`.
///
/// A target matches on exact equality, or when the target is country-only and
/// the viewer's country equals it. An empty target set never matches here;
/// callers treat "no targets" as unrestricted before calling.
#[must_use]
pub fn matches_any(targets: &[Geolocation], viewer: &Geolocation) -> bool {
    targets.iter().any(|target| {
        target == viewer || (target.region.is_none() && target.country == viewer.country)
    })
}
