//! Shape aggregates into the nested-by-geo-unit response structure

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::error::PipelineError;
use crate::market::aggregate::AggregateMap;
use crate::market::record::{GeoLevel, BEDROOM_SENTINEL, MAX_BEDROOMS};
use crate::market::yoy::YoyMap;

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Reported value of one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Average(f64),
    YoyChange(f64),
}

impl Metric {
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Average(_) => "avg",
            Metric::YoyChange(_) => "yoy",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Metric::Average(v) | Metric::YoyChange(v) => *v,
        }
    }
}

/// One `{<level>: geo, beds, avg|yoy}` entry
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedRow {
    pub level: GeoLevel,
    pub geo_unit: String,
    pub bedrooms: u8,
    pub metric: Metric,
}

impl Serialize for ShapedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(self.level.as_str(), &self.geo_unit)?;
        map.serialize_entry("beds", &self.bedrooms)?;
        map.serialize_entry(self.metric.key(), &self.metric.value())?;
        map.end()
    }
}

/// Geo-unit value → rows ordered by bedrooms
pub type ShapedOutput = BTreeMap<String, Vec<ShapedRow>>;

pub enum ShapeInput<'a> {
    Averages(&'a AggregateMap),
    Yoy(&'a YoyMap),
}

pub fn shape(input: ShapeInput<'_>, level: GeoLevel) -> Result<ShapedOutput, PipelineError> {
    match input {
        ShapeInput::Averages(aggs) => shape_averages(aggs, level),
        ShapeInput::Yoy(yoy) => Ok(shape_yoy(yoy, level)),
    }
}

pub fn shape_averages(aggs: &AggregateMap, level: GeoLevel) -> Result<ShapedOutput, PipelineError> {
    let mut output = ShapedOutput::new();
    for (key, agg) in aggs {
        if !(agg.mean.is_finite() && agg.mean > 0.0) {
            return Err(PipelineError::invariant(
                key,
                format!("average must be positive, got {}", agg.mean),
            ));
        }
        output.entry(key.geo_unit.clone()).or_default().push(ShapedRow {
            level,
            geo_unit: key.geo_unit.clone(),
            bedrooms: key.bedrooms,
            metric: Metric::Average(round1(agg.mean)),
        });
    }
    sort_rows(&mut output);
    Ok(output)
}

pub fn shape_yoy(yoy: &YoyMap, level: GeoLevel) -> ShapedOutput {
    let mut output = ShapedOutput::new();
    for (key, change) in yoy {
        output.entry(key.geo_unit.clone()).or_default().push(ShapedRow {
            level,
            geo_unit: key.geo_unit.clone(),
            bedrooms: key.bedrooms,
            metric: Metric::YoyChange(round1(change.percent_change)),
        });
    }
    sort_rows(&mut output);
    output
}

fn sort_rows(output: &mut ShapedOutput) {
    for rows in output.values_mut() {
        rows.sort_by_key(|r| r.bedrooms);
    }
}

/// All rows in geo-unit order
pub fn flatten(output: ShapedOutput) -> Vec<ShapedRow> {
    output.into_values().flatten().collect()
}

/// Keep rows whose bedroom bucket is listed
pub fn filter_beds(rows: Vec<ShapedRow>, beds: &[u8]) -> Vec<ShapedRow> {
    if beds.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|r| beds.contains(&r.bedrooms))
        .collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BedsFilterError {
    #[error("bedroom count not a number: {0:?}")]
    NotANumber(String),
    #[error("bedroom count must be at least 1, got {0}")]
    NotPositive(u32),
}

/// Parse `"2,3,6"`; counts above five map onto the "6+" bucket
pub fn parse_beds_filter(input: &str) -> Result<Vec<u8>, BedsFilterError> {
    let mut beds = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: u32 = part
            .parse()
            .map_err(|_| BedsFilterError::NotANumber(part.to_string()))?;
        if n == 0 {
            return Err(BedsFilterError::NotPositive(n));
        }
        let bucket = if n > MAX_BEDROOMS as u32 {
            BEDROOM_SENTINEL
        } else {
            n as u8
        };
        if !beds.contains(&bucket) {
            beds.push(bucket);
        }
    }
    Ok(beds)
}
