//! Record types flowing through the aggregation pipeline

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counties accepted as geo-units. "Laoighis" and "Laois" are kept as
/// distinct entries; records carrying either are never merged.
pub const COUNTIES: [&str; 31] = [
    "Antrim", "Carlow", "Cavan", "Clare", "Cork", "Donegal", "Down", "Dublin",
    "Fermanagh", "Galway", "Kerry", "Kildare", "Kilkenny", "Laoighis", "Laois",
    "Leitrim", "Limerick", "Longford", "Louth", "Mayo", "Meath", "Monaghan",
    "Offaly", "Roscommon", "Sligo", "Tipperary", "Tyrone", "Waterford",
    "Westmeath", "Wexford", "Wicklow",
];

/// Largest bedroom count reported as-is
pub const MAX_BEDROOMS: u8 = 5;

/// Bucket for "6 or more" bedrooms
pub const BEDROOM_SENTINEL: u8 = 6;

pub fn is_known_county(name: &str) -> bool {
    COUNTIES.contains(&name)
}

/// Market segment a record was listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Sale,
    Rent,
}

impl MarketType {
    /// Tag as stored by the search index
    pub fn tag(&self) -> &'static str {
        match self {
            MarketType::Sale => "Residential Sale",
            MarketType::Rent => "Residential Rent",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Sale => "sale",
            MarketType::Rent => "rent",
        }
    }

    pub fn matches_tag(&self, tag: &str) -> bool {
        tag.trim().eq_ignore_ascii_case(self.tag())
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic dimension used as the first half of a group key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    County,
    Region,
    Area,
}

impl GeoLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoLevel::County => "county",
            GeoLevel::Region => "region",
            GeoLevel::Area => "area",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as handed over by a source. Nothing is trusted yet.
///
/// `beds`, `price`, `sqrMetres`, `location` and `id` stay as raw JSON values
/// because indexes disagree on whether they are numbers or strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beds: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqr_metres: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_type: Option<String>,
}

/// Search index hit envelope
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_source")]
    pub source: RawRecord,
}

/// One JSONL line: either a bare record or a search hit
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawLine {
    Hit(SearchHit),
    Bare(RawRecord),
}

impl RawLine {
    pub fn into_record(self) -> RawRecord {
        match self {
            RawLine::Hit(hit) => hit.source,
            RawLine::Bare(record) => record,
        }
    }
}

/// Validated sale or rent observation.
///
/// Always satisfies `1 <= bedrooms <= 6`, `price > 0` and
/// `county ∈ COUNTIES`. Descriptive fields are carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub county: String,
    #[serde(rename = "beds")]
    pub bedrooms: u8,
    pub price: f64,
    pub sale_date: NaiveDate,
    pub area: String,
    pub region: String,
    pub raw_address: String,
    pub sqr_metres: f64,
    pub location: serde_json::Value,
    pub id: String,
}

impl CanonicalRecord {
    /// Value of the requested geo dimension, `None` when the record has none
    pub fn geo_value(&self, level: GeoLevel) -> Option<&str> {
        let value = match level {
            GeoLevel::County => self.county.as_str(),
            GeoLevel::Region => self.region.as_str(),
            GeoLevel::Area => self.area.as_str(),
        };
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn group_key(&self, level: GeoLevel) -> Option<GroupKey> {
        self.geo_value(level)
            .map(|geo| GroupKey::new(geo, self.bedrooms))
    }

    /// True if `name` equals the county, region or area
    pub fn is_in(&self, name: &str) -> bool {
        self.county == name || self.region == name || self.area == name
    }
}

/// (geo-unit, bedroom bucket)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub geo_unit: String,
    pub bedrooms: u8,
}

impl GroupKey {
    pub fn new(geo_unit: &str, bedrooms: u8) -> Self {
        Self {
            geo_unit: geo_unit.to_string(),
            bedrooms,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.geo_unit, self.bedrooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_keeps_both_laois_spellings() {
        assert_eq!(COUNTIES.len(), 31);
        assert!(is_known_county("Laois"));
        assert!(is_known_county("Laoighis"));
        assert!(!is_known_county("Atlantis"));
        assert!(!is_known_county("cork"));
    }

    #[test]
    fn test_market_type_tags() {
        assert_eq!(MarketType::Sale.tag(), "Residential Sale");
        assert!(MarketType::Rent.matches_tag("residential rent"));
        assert!(!MarketType::Sale.matches_tag("Residential Rent"));
    }

    #[test]
    fn test_raw_line_accepts_hit_or_bare() {
        let hit = r#"{"_id":"x","_source":{"county":"Cork","beds":3,"price":250000}}"#;
        let bare = r#"{"county":"Cork","beds":"3","saleDate":"2024-03-01"}"#;

        let hit: RawLine = serde_json::from_str(hit).unwrap();
        let bare: RawLine = serde_json::from_str(bare).unwrap();

        assert!(matches!(hit, RawLine::Hit(_)));
        let bare = bare.into_record();
        assert_eq!(bare.county.as_deref(), Some("Cork"));
        assert_eq!(bare.sale_date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_geo_value_skips_blank_dimensions() {
        let record = CanonicalRecord {
            county: "Cork".to_string(),
            bedrooms: 3,
            price: 1.0,
            sale_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            area: "Douglas".to_string(),
            region: " ".to_string(),
            raw_address: String::new(),
            sqr_metres: 0.0,
            location: serde_json::Value::String(String::new()),
            id: String::new(),
        };

        assert_eq!(record.geo_value(GeoLevel::County), Some("Cork"));
        assert_eq!(record.geo_value(GeoLevel::Area), Some("Douglas"));
        assert_eq!(record.geo_value(GeoLevel::Region), None);
        assert_eq!(record.group_key(GeoLevel::County), Some(GroupKey::new("Cork", 3)));
        assert!(record.is_in("Douglas"));
    }
}
