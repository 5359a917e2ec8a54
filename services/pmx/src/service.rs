//! One parameterised pipeline per request: fetch, normalize, aggregate, shape

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Duration;
use tracing::info;

use crate::cache::{CacheKey, NoCache, ResponseCache, TtlCache};
use crate::config::{Config, PipelineConfig, SourceKind};
use crate::market::aggregate::{aggregate, in_period, AggregateMap, AggregateOptions};
use crate::market::normalize::normalize_batch;
use crate::market::period::PeriodBounds;
use crate::market::record::{CanonicalRecord, GeoLevel, MarketType};
use crate::market::shape::{filter_beds, flatten, shape, ShapeInput, ShapedOutput, ShapedRow};
use crate::market::yoy::{compute_yoy, YoyMap};
use crate::source::{JsonlSource, MockSource, RecordQuery, RecordSource, SearchIndexSource};

/// Which metric a request reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Version {
    #[value(alias = "avg")]
    Average,
    Yoy,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Average => write!(f, "average"),
            Version::Yoy => write!(f, "yoy"),
        }
    }
}

/// Unshaped figures for export
#[derive(Debug, Clone, PartialEq)]
pub struct MarketReport {
    pub market: MarketType,
    pub level: GeoLevel,
    pub bounds: PeriodBounds,
    pub averages: AggregateMap,
    pub yoy: YoyMap,
}

/// Cached value of one service call
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    Shaped(ShapedOutput),
    Properties(Vec<CanonicalRecord>),
}

pub struct MarketService<S> {
    source: S,
    pipeline: PipelineConfig,
    max_size: usize,
    cache: Box<dyn ResponseCache<ServiceResponse>>,
    cache_ttl: Duration,
    today: Option<NaiveDate>,
}

/// Build the record source named by `source.kind`
pub fn build_source(config: &Config) -> Result<Box<dyn RecordSource>> {
    let source: Box<dyn RecordSource> = match config.source.kind {
        SourceKind::Jsonl => Box::new(JsonlSource::new(&config.source.path)),
        SourceKind::Search => Box::new(
            SearchIndexSource::from_config(&config.source)
                .context("Failed to configure search index source")?,
        ),
        SourceKind::Mock => Box::new(MockSource::new(
            config.mock.records,
            config.mock.seed,
            config.mock.invalid_fraction,
        )),
    };
    info!("Using {} record source", source.name());
    Ok(source)
}

impl MarketService<Box<dyn RecordSource>> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = build_source(config)?;
        let service = Self::new(source, config.pipeline.clone(), config.source.max_size);
        if config.cache.enabled {
            Ok(service.with_cache(
                TtlCache::new(),
                Duration::from_secs(config.cache.ttl_secs),
            ))
        } else {
            Ok(service)
        }
    }
}

impl<S: RecordSource> MarketService<S> {
    /// Service without caching, dated by the local clock
    pub fn new(source: S, pipeline: PipelineConfig, max_size: usize) -> Self {
        Self {
            source,
            pipeline,
            max_size,
            cache: Box::new(NoCache),
            cache_ttl: Duration::ZERO,
            today: None,
        }
    }

    pub fn with_cache<C>(mut self, cache: C, ttl: Duration) -> Self
    where
        C: ResponseCache<ServiceResponse> + 'static,
    {
        self.cache = Box::new(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Pin "today" instead of reading the clock
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn periods(&self) -> PeriodBounds {
        PeriodBounds::resolve_with(self.today(), self.pipeline.lookback_years)
    }

    async fn load(&self, market: MarketType, bounds: &PeriodBounds) -> Result<Vec<CanonicalRecord>> {
        let query = RecordQuery::new(market, bounds.fetch_window(), self.max_size);
        let raw = self
            .source
            .fetch(&query)
            .await
            .with_context(|| format!("Failed to fetch {} records from {}", market, self.source.name()))?;
        let (records, _stats) = normalize_batch(raw);
        Ok(records)
    }

    /// Shaped output for every geo-unit at `level`
    pub async fn all(&self, market: MarketType, level: GeoLevel, version: Version) -> Result<ShapedOutput> {
        let bounds = self.periods();
        let key = CacheKey::new("all")
            .param("market", market)
            .param("level", level)
            .param("version", version)
            .param("end", bounds.lookback_end);

        if let Some(ServiceResponse::Shaped(cached)) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let records = self.load(market, &bounds).await?;
        let options = AggregateOptions {
            level,
            trim_outliers: self.pipeline.trim_outliers,
        };

        let shaped = match version {
            Version::Average => {
                let aggs = aggregate(in_period(&records, bounds.lookback()), options);
                info!("{} {} groups over {}", aggs.len(), market, bounds.lookback());
                shape(ShapeInput::Averages(&aggs), level)?
            }
            Version::Yoy => {
                let current = aggregate(in_period(&records, bounds.current()), options);
                let prior = aggregate(in_period(&records, bounds.prior()), options);
                let yoy = compute_yoy(&current, &prior)?;
                info!(
                    "{} {} YoY groups ({} current over {}, {} prior over {})",
                    yoy.len(),
                    market,
                    current.len(),
                    bounds.current(),
                    prior.len(),
                    bounds.prior()
                );
                shape(ShapeInput::Yoy(&yoy), level)?
            }
        };

        self.cache
            .put(key, ServiceResponse::Shaped(shaped.clone()), self.cache_ttl)
            .await;
        Ok(shaped)
    }

    /// Lookback averages and YoY changes from a single fetch
    pub async fn report(&self, market: MarketType, level: GeoLevel) -> Result<MarketReport> {
        let bounds = self.periods();
        let records = self.load(market, &bounds).await?;
        let options = AggregateOptions {
            level,
            trim_outliers: self.pipeline.trim_outliers,
        };

        let averages = aggregate(in_period(&records, bounds.lookback()), options);
        let current = aggregate(in_period(&records, bounds.current()), options);
        let prior = aggregate(in_period(&records, bounds.prior()), options);
        let yoy = compute_yoy(&current, &prior)?;

        Ok(MarketReport {
            market,
            level,
            bounds,
            averages,
            yoy,
        })
    }

    async fn county_rows(&self, county: &str, beds: &[u8], version: Version) -> Result<Vec<ShapedRow>> {
        let mut shaped = self.all(MarketType::Sale, GeoLevel::County, version).await?;
        let rows = shaped.remove(county).unwrap_or_default();
        Ok(filter_beds(rows, beds))
    }

    /// Sale averages for one county; an empty `beds` keeps every bucket
    pub async fn average(&self, county: &str, beds: &[u8]) -> Result<Vec<ShapedRow>> {
        self.county_rows(county, beds, Version::Average).await
    }

    pub async fn yoy(&self, county: &str, beds: &[u8]) -> Result<Vec<ShapedRow>> {
        self.county_rows(county, beds, Version::Yoy).await
    }

    /// Rent figures per county as a single list
    pub async fn rent(&self, version: Version) -> Result<Vec<ShapedRow>> {
        let shaped = self.all(MarketType::Rent, GeoLevel::County, version).await?;
        Ok(flatten(shaped))
    }

    /// Sale records located in `area` ("All" for every record)
    pub async fn properties(&self, area: &str) -> Result<Vec<CanonicalRecord>> {
        let bounds = self.periods();
        let key = CacheKey::new("properties")
            .param("area", area)
            .param("end", bounds.lookback_end);

        if let Some(ServiceResponse::Properties(cached)) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let records: Vec<CanonicalRecord> = self
            .load(MarketType::Sale, &bounds)
            .await?
            .into_iter()
            .filter(|r| bounds.lookback().contains(r.sale_date))
            .filter(|r| area == "All" || r.is_in(area))
            .take(self.pipeline.property_limit)
            .collect();
        info!("{} properties in {}", records.len(), area);

        self.cache
            .put(key, ServiceResponse::Properties(records.clone()), self.cache_ttl)
            .await;
        Ok(records)
    }
}
