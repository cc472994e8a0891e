use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub location: String,
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl Location {
    /// Parse a stored `"City, Country"` string. The country falls back to
    /// `default_country` when only a city is given.
    pub fn parse(raw: &str, default_country: &str) -> TrackResult<Self> {
        let mut parts = raw.splitn(2, ", ");
        let city = parts.next().unwrap_or("").trim();
        if city.is_empty() {
            return Err(TrackError::Configuration(format!(
                "location '{}' has no city",
                raw
            )));
        }
        let country = match parts.next().map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => default_country,
        };
        Ok(Self {
            city: city.to_string(),
            country: country.to_string(),
        })
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_city_and_country() {
        let loc = Location::parse("Alexandria, Egypt", "Egypt").unwrap();
        assert_eq!(loc.city, "Alexandria");
        assert_eq!(loc.country, "Egypt");

        let loc = Location::parse("Istanbul, Turkey", "Egypt").unwrap();
        assert_eq!(loc.country, "Turkey");
    }

    #[test]
    fn country_defaults_when_absent() {
        let loc = Location::parse("Cairo", "Egypt").unwrap();
        assert_eq!(loc.city, "Cairo");
        assert_eq!(loc.country, "Egypt");
    }

    #[test]
    fn empty_city_is_configuration_error() {
        assert!(matches!(
            Location::parse("", "Egypt"),
            Err(TrackError::Configuration(_))
        ));
        assert!(matches!(
            Location::parse("   , Egypt", "Egypt"),
            Err(TrackError::Configuration(_))
        ));
    }
}
