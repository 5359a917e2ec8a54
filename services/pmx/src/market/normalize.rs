//! Validate raw records into canonical records

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::market::record::*;

/// Why a raw record was dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("bedroom count missing")]
    MissingBedrooms,
    #[error("bedroom count not a positive integer: {0}")]
    InvalidBedrooms(String),
    #[error("price missing")]
    MissingPrice,
    #[error("price not a positive number: {0}")]
    InvalidPrice(String),
    #[error("county missing")]
    MissingCounty,
    #[error("county not recognised: {0}")]
    UnknownCounty(String),
    #[error("sale date missing")]
    MissingSaleDate,
    #[error("sale date not parseable: {0}")]
    InvalidSaleDate(String),
}

impl RejectionReason {
    pub fn kind(&self) -> &'static str {
        match self {
            RejectionReason::MissingBedrooms => "missing_bedrooms",
            RejectionReason::InvalidBedrooms(_) => "invalid_bedrooms",
            RejectionReason::MissingPrice => "missing_price",
            RejectionReason::InvalidPrice(_) => "invalid_price",
            RejectionReason::MissingCounty => "missing_county",
            RejectionReason::UnknownCounty(_) => "unknown_county",
            RejectionReason::MissingSaleDate => "missing_sale_date",
            RejectionReason::InvalidSaleDate(_) => "invalid_sale_date",
        }
    }
}

/// Normalize a single raw record.
///
/// Checks run in a fixed order: bedrooms, price, county, sale date.
/// The first failing check decides the rejection reason.
pub fn normalize_record(raw: &RawRecord) -> Result<CanonicalRecord, RejectionReason> {
    let bedrooms = parse_bedrooms(raw.beds.as_ref())?;
    let price = parse_price(raw.price.as_ref())?;

    let county = match raw.county.as_deref() {
        None | Some("") => return Err(RejectionReason::MissingCounty),
        Some(name) if !is_known_county(name) => {
            return Err(RejectionReason::UnknownCounty(name.to_string()))
        }
        Some(name) => name.to_string(),
    };

    let sale_date = match raw.sale_date.as_deref().map(str::trim) {
        None | Some("") => return Err(RejectionReason::MissingSaleDate),
        Some(s) => parse_sale_date(s)
            .ok_or_else(|| RejectionReason::InvalidSaleDate(s.to_string()))?,
    };

    Ok(CanonicalRecord {
        county,
        bedrooms,
        price,
        sale_date,
        area: raw.area.clone().unwrap_or_default(),
        region: raw.region.clone().unwrap_or_default(),
        raw_address: raw.raw_address.clone().unwrap_or_default(),
        sqr_metres: raw.sqr_metres.as_ref().and_then(as_number).unwrap_or(0.0),
        location: raw
            .location
            .clone()
            .unwrap_or_else(|| Value::String(String::new())),
        id: raw.id.as_ref().map(id_string).unwrap_or_default(),
    })
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time component
pub fn parse_sale_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

fn parse_bedrooms(value: Option<&Value>) -> Result<u8, RejectionReason> {
    let value = match value {
        None | Some(Value::Null) => return Err(RejectionReason::MissingBedrooms),
        Some(v) => v,
    };
    let invalid = || RejectionReason::InvalidBedrooms(value.to_string());

    let count = as_integer(value).ok_or_else(invalid)?;
    if count <= 0 {
        return Err(invalid());
    }
    if count > MAX_BEDROOMS as i64 {
        return Ok(BEDROOM_SENTINEL);
    }
    Ok(count as u8)
}

fn parse_price(value: Option<&Value>) -> Result<f64, RejectionReason> {
    let value = match value {
        None | Some(Value::Null) => return Err(RejectionReason::MissingPrice),
        Some(v) => v,
    };
    match as_number(value) {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p),
        _ => Err(RejectionReason::InvalidPrice(value.to_string())),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Whole numbers only; `3.0` and `"3"` pass, `2.5` does not
fn as_integer(value: &Value) -> Option<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    let f = as_number(value)?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Per-reason counts collected while normalizing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeStats {
    pub accepted: usize,
    pub rejected: BTreeMap<&'static str, usize>,
}

impl NormalizeStats {
    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    fn record(&mut self, reason: &RejectionReason) {
        *self.rejected.entry(reason.kind()).or_default() += 1;
    }
}

/// Lazy single-pass normalizer over a raw record stream
pub struct Normalizer<I> {
    inner: I,
    stats: NormalizeStats,
}

impl<I> Normalizer<I> {
    pub fn stats(&self) -> &NormalizeStats {
        &self.stats
    }
}

impl<I: Iterator<Item = RawRecord>> Iterator for Normalizer<I> {
    type Item = CanonicalRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for raw in self.inner.by_ref() {
            match normalize_record(&raw) {
                Ok(record) => {
                    self.stats.accepted += 1;
                    return Some(record);
                }
                Err(reason) => {
                    debug!("Rejected record id={:?}: {}", raw.id, reason);
                    self.stats.record(&reason);
                }
            }
        }
        None
    }
}

pub fn normalize_all<I>(records: I) -> Normalizer<I::IntoIter>
where
    I: IntoIterator<Item = RawRecord>,
{
    Normalizer {
        inner: records.into_iter(),
        stats: NormalizeStats::default(),
    }
}

/// Normalize a buffered batch and log the outcome
pub fn normalize_batch(records: Vec<RawRecord>) -> (Vec<CanonicalRecord>, NormalizeStats) {
    let mut normalizer = normalize_all(records);
    let canonical: Vec<CanonicalRecord> = normalizer.by_ref().collect();
    let stats = normalizer.stats().clone();

    tracing::info!(
        "Normalized {} records, rejected {} {:?}",
        stats.accepted,
        stats.total_rejected(),
        stats.rejected
    );

    (canonical, stats)
}
