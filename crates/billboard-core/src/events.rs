use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Default click-value of a single conversion-class event.
pub const DEFAULT_CONVERSION_WEIGHT: i64 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Impression,
    Click,
    Conversion,
    Signup,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::Impression,
        EventCategory::Click,
        EventCategory::Conversion,
        EventCategory::Signup,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Impression => "impression",
            EventCategory::Click => "click",
            EventCategory::Conversion => "conversion",
            EventCategory::Signup => "signup",
        }
    }

    /// Conversion-class categories contribute a weighted amount to click value.
    #[must_use]
    pub fn is_conversion_class(self) -> bool {
        matches!(self, EventCategory::Conversion | EventCategory::Signup)
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::validation("category", s))
    }
}

/// Page context an event was generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Home,
    Article,
    Tag,
    Email,
}

impl ContextType {
    pub const ALL: [ContextType; 4] = [
        ContextType::Home,
        ContextType::Article,
        ContextType::Tag,
        ContextType::Email,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContextType::Home => "home",
            ContextType::Article => "article",
            ContextType::Tag => "tag",
            ContextType::Email => "email",
        }
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContextType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextType::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::validation("context_type", s))
    }
}

/// Configured click-value per conversion-class category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionWeights {
    pub conversion: i64,
    pub signup: i64,
}

impl Default for ConversionWeights {
    fn default() -> Self {
        Self {
            conversion: DEFAULT_CONVERSION_WEIGHT,
            signup: DEFAULT_CONVERSION_WEIGHT,
        }
    }
}

impl ConversionWeights {
    /// Weight of one event of `category`; zero for non-conversion categories.
    #[must_use]
    pub fn weight_of(&self, category: EventCategory) -> i64 {
        match category {
            EventCategory::Conversion => self.conversion,
            EventCategory::Signup => self.signup,
            EventCategory::Impression | EventCategory::Click => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_parse_from_wire_names() {
        assert_eq!("click".parse::<EventCategory>().unwrap(), EventCategory::Click);
        assert_eq!("signup".parse::<EventCategory>().unwrap(), EventCategory::Signup);
        assert!("view".parse::<EventCategory>().is_err());
    }

    #[test]
    fn only_conversion_and_signup_are_conversion_class() {
        assert!(EventCategory::Conversion.is_conversion_class());
        assert!(EventCategory::Signup.is_conversion_class());
        assert!(!EventCategory::Click.is_conversion_class());
        assert!(!EventCategory::Impression.is_conversion_class());
    }

    #[test]
    fn context_type_rejects_unknown() {
        assert_eq!("tag".parse::<ContextType>().unwrap(), ContextType::Tag);
        let err = "sidebar".parse::<ContextType>().unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "context_type", .. }));
    }

    #[test]
    fn default_weights_are_twenty_five() {
        let weights = ConversionWeights::default();
        assert_eq!(weights.weight_of(EventCategory::Conversion), 25);
        assert_eq!(weights.weight_of(EventCategory::Signup), 25);
        assert_eq!(weights.weight_of(EventCategory::Click), 0);
    }
}
