//! Group canonical records by (geo-unit, bedrooms) and average their prices

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::market::period::Period;
use crate::market::record::{CanonicalRecord, GeoLevel, GroupKey};

pub const TRIM_LOWER_QUANTILE: f64 = 0.05;
pub const TRIM_UPPER_QUANTILE: f64 = 0.95;

/// Mean price and record count of one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregate {
    pub mean: f64,
    pub count: usize,
}

/// Aggregates ordered by geo-unit, then bedroom bucket
pub type AggregateMap = BTreeMap<GroupKey, Aggregate>;

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub level: GeoLevel,
    pub trim_outliers: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            level: GeoLevel::County,
            trim_outliers: false,
        }
    }
}

/// Quantile of pre-sorted values with linear interpolation between ranks
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Keep records strictly between the 5th and 95th price percentiles.
///
/// If both percentiles coincide only records priced exactly at that value
/// are kept, so all-equal prices survive untouched.
pub fn trim_outliers<'a>(records: Vec<&'a CanonicalRecord>) -> Vec<&'a CanonicalRecord> {
    let mut prices: Vec<f64> = records.iter().map(|r| r.price).collect();
    prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let (lower, upper) = match (
        quantile(&prices, TRIM_LOWER_QUANTILE),
        quantile(&prices, TRIM_UPPER_QUANTILE),
    ) {
        (Some(lower), Some(upper)) => (lower, upper),
        _ => return records,
    };
    let before = records.len();
    let kept: Vec<&CanonicalRecord> = if lower == upper {
        records.into_iter().filter(|r| r.price == lower).collect()
    } else {
        records
            .into_iter()
            .filter(|r| lower < r.price && r.price < upper)
            .collect()
    };
    debug!(
        "Trimmed {} of {} records outside ({:.1}, {:.1})",
        before - kept.len(),
        before,
        lower,
        upper
    );
    kept
}

/// Aggregate records into per-group means and counts.
///
/// Records without a value for `options.level` do not form a group.
pub fn aggregate<'a, I>(records: I, options: AggregateOptions) -> AggregateMap
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let mut records: Vec<&CanonicalRecord> = records.into_iter().collect();
    if options.trim_outliers {
        records = trim_outliers(records);
    }

    let mut sums: BTreeMap<GroupKey, (f64, usize)> = BTreeMap::new();
    for record in records {
        if let Some(key) = record.group_key(options.level) {
            let entry = sums.entry(key).or_insert((0.0, 0));
            entry.0 += record.price;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(key, (sum, count))| {
            (
                key,
                Aggregate {
                    mean: sum / count as f64,
                    count,
                },
            )
        })
        .collect()
}

/// Records whose sale date falls inside `period`
pub fn in_period<'a>(
    records: &'a [CanonicalRecord],
    period: Period,
) -> impl Iterator<Item = &'a CanonicalRecord> + 'a {
    records.iter().filter(move |r| period.contains(r.sale_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(county: &str, beds: u8, price: f64, date: &str) -> CanonicalRecord {
        CanonicalRecord {
            county: county.to_string(),
            bedrooms: beds,
            price,
            sale_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            area: String::new(),
            region: String::new(),
            raw_address: String::new(),
            sqr_metres: 0.0,
            location: serde_json::Value::String(String::new()),
            id: String::new(),
        }
    }

    #[test]
    fn test_quantile_linear() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        assert!((quantile(&values, 0.05).unwrap() - 5.95).abs() < 1e-9);
        assert!((quantile(&values, 0.95).unwrap() - 95.05).abs() < 1e-9);
        assert_eq!(quantile(&[7.0], 0.5), Some(7.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_groups_by_county_and_beds() {
        let records = vec![
            rec("Cork", 3, 250000.0, "2024-03-01"),
            rec("Cork", 3, 260000.0, "2024-04-01"),
            rec("Cork", 6, 999999.0, "2024-03-15"),
        ];

        let aggs = aggregate(&records, AggregateOptions::default());

        assert_eq!(aggs.len(), 2);
        assert_eq!(
            aggs[&GroupKey::new("Cork", 3)],
            Aggregate { mean: 255000.0, count: 2 }
        );
        assert_eq!(
            aggs[&GroupKey::new("Cork", 6)],
            Aggregate { mean: 999999.0, count: 1 }
        );
    }

    #[test]
    fn test_empty_input_yields_empty_map() {
        let records: Vec<CanonicalRecord> = Vec::new();
        let trimmed = AggregateOptions { trim_outliers: true, ..Default::default() };
        assert!(aggregate(&records, trimmed).is_empty());
        assert!(aggregate(&records, AggregateOptions::default()).is_empty());
    }

    #[test]
    fn test_trim_keeps_uniform_prices() {
        let records = vec![
            rec("Cork", 2, 300000.0, "2024-01-01"),
            rec("Cork", 2, 300000.0, "2024-01-02"),
            rec("Cork", 2, 300000.0, "2024-01-03"),
        ];
        let kept = trim_outliers(records.iter().collect());
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_trim_drops_outlier_when_quantiles_coincide() {
        let mut records: Vec<CanonicalRecord> = (0..40)
            .map(|_| rec("Cork", 3, 100.0, "2024-01-01"))
            .collect();
        records.push(rec("Cork", 3, 1_000_000.0, "2024-01-02"));

        let kept = trim_outliers(records.iter().collect());
        assert_eq!(kept.len(), 40);
        assert!(kept.iter().all(|r| r.price == 100.0));

        let options = AggregateOptions { trim_outliers: true, ..Default::default() };
        let aggs = aggregate(&records, options);
        assert_eq!(aggs[&GroupKey::new("Cork", 3)], Aggregate { mean: 100.0, count: 40 });
    }

    #[test]
    fn test_trim_excludes_boundaries() {
        let records = vec![
            rec("Cork", 2, 100.0, "2024-01-01"),
            rec("Cork", 2, 200.0, "2024-01-02"),
        ];
        let kept = trim_outliers(records.iter().collect());
        assert!(kept.is_empty());

        let options = AggregateOptions { trim_outliers: true, ..Default::default() };
        assert!(aggregate(&records, options).is_empty());
    }

    #[test]
    fn test_trim_spans_whole_collection() {
        // 1..=20 across two counties; quantiles 1.95 and 19.05
        let records: Vec<CanonicalRecord> = (1..=20)
            .map(|p| {
                let county = if p % 2 == 0 { "Cork" } else { "Kerry" };
                rec(county, 2, p as f64, "2024-01-01")
            })
            .collect();

        let kept = trim_outliers(records.iter().collect());
        assert_eq!(kept.len(), 18);
        assert!(kept.iter().all(|r| r.price >= 2.0 && r.price <= 19.0));

        let options = AggregateOptions { trim_outliers: true, ..Default::default() };
        let aggs = aggregate(&records, options);
        assert_eq!(aggs[&GroupKey::new("Cork", 2)].count, 9);
        assert_eq!(aggs[&GroupKey::new("Kerry", 2)].count, 9);
    }

    #[test]
    fn test_region_level_skips_blank_regions() {
        let mut a = rec("Cork", 2, 100.0, "2024-01-01");
        a.region = "South".to_string();
        let b = rec("Cork", 2, 300.0, "2024-01-01");

        let records = vec![a, b];
        let options = AggregateOptions { level: GeoLevel::Region, trim_outliers: false };
        let aggs = aggregate(&records, options);

        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[&GroupKey::new("South", 2)], Aggregate { mean: 100.0, count: 1 });
    }

    #[test]
    fn test_laois_spellings_stay_separate() {
        let records = vec![
            rec("Laois", 3, 200.0, "2024-01-01"),
            rec("Laoighis", 3, 400.0, "2024-01-01"),
        ];
        let aggs = aggregate(&records, AggregateOptions::default());
        assert_eq!(aggs.len(), 2);
    }

    #[test]
    fn test_in_period_filters_by_sale_date() {
        let records = vec![
            rec("Cork", 2, 1.0, "2023-12-31"),
            rec("Cork", 2, 2.0, "2024-01-01"),
            rec("Cork", 2, 3.0, "2024-06-30"),
            rec("Cork", 2, 4.0, "2024-07-01"),
        ];
        let period = Period::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        );
        let prices: Vec<f64> = in_period(&records, period).map(|r| r.price).collect();
        assert_eq!(prices, vec![2.0, 3.0]);
    }
}
