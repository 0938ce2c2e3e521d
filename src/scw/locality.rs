//! Zones, regions and localized resource identifiers
//!
//! Scaleway identifies most resources with a composite string made of a
//! locality and a UUID: `fr-par-1/11111111-...` for zoned resources,
//! `fr-par/11111111-...` for regional ones. Global resources use the bare UUID.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Zones the provider knows about (used by sweepers and validation hints)
pub const KNOWN_ZONES: &[&str] = &[
    "fr-par-1", "fr-par-2", "fr-par-3", "nl-ams-1", "nl-ams-2", "pl-waw-1", "pl-waw-2",
];

/// Regions the provider knows about
pub const KNOWN_REGIONS: &[&str] = &["fr-par", "nl-ams", "pl-waw"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalityError {
    #[error("invalid zone `{0}`, expected something like fr-par-1")]
    InvalidZone(String),

    #[error("invalid region `{0}`, expected something like fr-par")]
    InvalidRegion(String),

    #[error("cannot parse localized ID `{0}`")]
    InvalidId(String),
}

/// `cc-xxx`: two letter country code and three letter city code
fn is_region_shape(s: &str) -> bool {
    let mut parts = s.split('-');
    let (Some(country), Some(city), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    country.len() == 2
        && city.len() == 3
        && country.chars().all(|c| c.is_ascii_lowercase())
        && city.chars().all(|c| c.is_ascii_lowercase())
}

pub fn is_region(s: &str) -> bool {
    is_region_shape(s)
}

pub fn is_zone(s: &str) -> bool {
    match s.rsplit_once('-') {
        Some((region, number)) => {
            is_region_shape(region)
                && !number.is_empty()
                && number.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// A Scaleway availability zone (`fr-par-1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Zone(String);

impl Zone {
    pub fn parse(s: &str) -> Result<Self, LocalityError> {
        if is_zone(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(LocalityError::InvalidZone(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Region hosting this zone (`fr-par-1` -> `fr-par`)
    pub fn region(&self) -> Region {
        let (region, _) = self
            .0
            .rsplit_once('-')
            .unwrap_or((self.0.as_str(), ""));
        Region(region.to_string())
    }

    pub fn known() -> Vec<Zone> {
        KNOWN_ZONES.iter().map(|z| Zone(z.to_string())).collect()
    }
}

/// A Scaleway region (`fr-par`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    pub fn parse(s: &str) -> Result<Self, LocalityError> {
        if is_region(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(LocalityError::InvalidRegion(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First zone of the region, used when upgrading regional IDs
    pub fn first_zone(&self) -> Zone {
        Zone(format!("{}-1", self.0))
    }

    /// Known zones located in this region
    pub fn zones(&self) -> Vec<Zone> {
        Zone::known()
            .into_iter()
            .filter(|z| z.region() == *self)
            .collect()
    }

    pub fn known() -> Vec<Region> {
        KNOWN_REGIONS.iter().map(|r| Region(r.to_string())).collect()
    }
}

macro_rules! string_newtype_impls {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = LocalityError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = LocalityError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.0
            }
        }
    };
}

string_newtype_impls!(Zone);
string_newtype_impls!(Region);

/// Split a localized ID on its last `/`.
///
/// `fr-par-1/abc` -> `("fr-par-1", "abc")`, `abc` -> `("", "abc")`.
pub fn parse_localized_id(localized: &str) -> Result<(&str, &str), LocalityError> {
    match localized.rsplit_once('/') {
        Some((_, "")) => Err(LocalityError::InvalidId(localized.to_string())),
        Some((locality, id)) => Ok((locality, id)),
        None if localized.is_empty() => Err(LocalityError::InvalidId(localized.to_string())),
        None => Ok(("", localized)),
    }
}

/// Strip the locality from an ID if there is one
pub fn expand_id(localized: &str) -> &str {
    parse_localized_id(localized)
        .map(|(_, id)| id)
        .unwrap_or(localized)
}

/// `<zone>/<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonedId {
    pub zone: Zone,
    pub id: String,
}

impl ZonedId {
    pub fn new(zone: Zone, id: impl Into<String>) -> Self {
        Self { zone, id: id.into() }
    }

    pub fn parse(s: &str) -> Result<Self, LocalityError> {
        let (locality, id) = parse_localized_id(s)?;
        let zone = Zone::parse(locality).map_err(|_| LocalityError::InvalidId(s.to_string()))?;
        Ok(Self::new(zone, id))
    }
}

impl fmt::Display for ZonedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.id)
    }
}

/// `<region>/<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalId {
    pub region: Region,
    pub id: String,
}

impl RegionalId {
    pub fn new(region: Region, id: impl Into<String>) -> Self {
        Self { region, id: id.into() }
    }

    pub fn parse(s: &str) -> Result<Self, LocalityError> {
        let (locality, id) = parse_localized_id(s)?;
        let region =
            Region::parse(locality).map_err(|_| LocalityError::InvalidId(s.to_string()))?;
        Ok(Self::new(region, id))
    }
}

impl fmt::Display for RegionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.id)
    }
}
