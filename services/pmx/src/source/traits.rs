use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::market::normalize::parse_sale_date;
use crate::market::period::Period;
use crate::market::record::{MarketType, RawRecord};

/// What a source is asked for: one market segment over one date window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordQuery {
    pub market: MarketType,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub max_size: usize,
}

impl RecordQuery {
    pub fn new(market: MarketType, period: Period, max_size: usize) -> Self {
        Self {
            market,
            from: period.from,
            to: period.to,
            max_size,
        }
    }

    pub fn period(&self) -> Period {
        Period::new(self.from, self.to)
    }

    /// Filter applied by sources that cannot push it down.
    ///
    /// Untagged records are kept, as are records whose date does not parse,
    /// so the normalizer can reject those with a reason.
    pub fn admits(&self, record: &RawRecord) -> bool {
        if let Some(tag) = record.market_type.as_deref() {
            if !self.market.matches_tag(tag) {
                return false;
            }
        }
        match record.sale_date.as_deref().and_then(parse_sale_date) {
            Some(date) => self.period().contains(date),
            None => true,
        }
    }
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawRecord>>;
}

#[async_trait]
impl RecordSource for Box<dyn RecordSource> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawRecord>> {
        self.as_ref().fetch(query).await
    }
}

/// Records held in memory
pub struct StaticSource {
    records: Vec<RawRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| query.admits(r))
            .take(query.max_size)
            .cloned()
            .collect())
    }
}
