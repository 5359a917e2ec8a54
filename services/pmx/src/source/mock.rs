use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Duration};
use serde_json::json;

use super::traits::{RecordQuery, RecordSource};
use crate::market::period::Period;
use crate::market::record::{MarketType, RawRecord};

/// (county, typical 3-bed sale price, regions)
const MOCK_COUNTIES: [(&str, f64, [&str; 2]); 8] = [
    ("Dublin", 480_000.0, ["Dublin City", "South Dublin"]),
    ("Cork", 340_000.0, ["Cork City", "West Cork"]),
    ("Galway", 320_000.0, ["Galway City", "Connemara"]),
    ("Limerick", 270_000.0, ["Limerick City", "County Limerick"]),
    ("Kildare", 380_000.0, ["North Kildare", "South Kildare"]),
    ("Mayo", 190_000.0, ["Castlebar", "Westport"]),
    ("Laois", 230_000.0, ["Portlaoise", "Portarlington"]),
    ("Laoighis", 225_000.0, ["Portlaoise", "Abbeyleix"]),
];

/// Generates reproducible synthetic records
pub struct MockSource {
    records_per_query: usize,
    seed: u64,
    invalid_fraction: f64,
}

impl MockSource {
    pub fn new(records_per_query: usize, seed: u64, invalid_fraction: f64) -> Self {
        Self {
            records_per_query,
            seed,
            invalid_fraction,
        }
    }
}

#[async_trait]
impl RecordSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawRecord>> {
        let count = self.records_per_query.min(query.max_size);
        Ok(generate_mock_records(
            query.market,
            query.period(),
            count,
            self.seed,
            self.invalid_fraction,
        ))
    }
}

/// Generate `count` records dated inside `period`.
///
/// Roughly `invalid_fraction` of them carry exactly one defect the
/// normalizer rejects.
pub fn generate_mock_records(
    market: MarketType,
    period: Period,
    count: usize,
    seed: u64,
    invalid_fraction: f64,
) -> Vec<RawRecord> {
    let mut rng = fastrand::Rng::with_seed(seed.wrapping_add(market as u64));
    let span_days = (period.to - period.from).num_days().max(0);
    let start_year = period.from.year();

    (0..count)
        .map(|i| {
            let (county, base, regions) = MOCK_COUNTIES[rng.usize(..MOCK_COUNTIES.len())];
            let region = regions[rng.usize(..regions.len())];
            let beds = rng.i64(1..=8);
            let date = period.from + Duration::days(rng.i64(0..=span_days));

            // ~6% yearly growth, ±10% noise, ±15% per bedroom from three
            let growth = 1.06_f64.powi(date.year() - start_year);
            let noise = 0.9 + rng.f64() * 0.2;
            let bed_factor = 1.0 + 0.15 * (beds.min(6) - 3) as f64;
            let mut price = base * growth * noise * bed_factor.max(0.4);
            if market == MarketType::Rent {
                price /= 200.0;
            }

            let mut record = RawRecord {
                beds: Some(json!(beds)),
                price: Some(json!((price * 100.0).round() / 100.0)),
                county: Some(county.to_string()),
                region: Some(region.to_string()),
                area: Some(format!("{} {}", region, rng.u8(1..=9))),
                sale_date: Some(date.format("%Y-%m-%d").to_string()),
                raw_address: Some(format!("{} Main Street, {}", rng.u16(1..400), region)),
                sqr_metres: Some(json!(40 + beds * 22 + rng.i64(0..30))),
                location: Some(json!({ "lat": 51.5 + rng.f64() * 3.5, "lon": -10.0 + rng.f64() * 4.0 })),
                id: Some(json!(format!("mock-{}-{}", market, i))),
                market_type: Some(market.tag().to_string()),
            };

            if rng.f64() < invalid_fraction {
                match rng.u8(0..4) {
                    0 => record.beds = Some(json!(0)),
                    1 => record.price = None,
                    2 => record.county = Some("Atlantis".to_string()),
                    _ => record.sale_date = Some("n/a".to_string()),
                }
            }
            record
        })
        .collect()
}
