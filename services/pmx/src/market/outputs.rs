//! Output writing for aggregation results (JSON and Parquet)

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::{Path, PathBuf};

use crate::market::aggregate::AggregateMap;
use crate::market::record::{GeoLevel, MarketType};
use crate::market::shape::ShapedOutput;
use crate::market::yoy::YoyMap;

fn report_dir(data_dir: &str, market: MarketType, level: GeoLevel, date: &str) -> PathBuf {
    Path::new(data_dir)
        .join("reports")
        .join(format!("market={}", market))
        .join(format!("level={}", level))
        .join(format!("date={}", date))
}

/// Write shaped output as pretty JSON
pub fn write_shaped_json<P: AsRef<Path>>(path: P, output: &ShapedOutput) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(output)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;

    tracing::info!("Wrote {} geo-units to {:?}", output.len(), path);
    Ok(())
}

/// Write per-group averages to Parquet
pub fn write_aggregates_parquet(
    data_dir: &str,
    market: MarketType,
    level: GeoLevel,
    date: &str,
    aggregates: &AggregateMap,
) -> Result<Option<PathBuf>> {
    if aggregates.is_empty() {
        tracing::info!("No aggregates to write");
        return Ok(None);
    }

    let dir = report_dir(data_dir, market, level, date);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("averages.parquet");

    let geo_col: Vec<&str> = aggregates.keys().map(|k| k.geo_unit.as_str()).collect();
    let level_col: Vec<&str> = aggregates.keys().map(|_| level.as_str()).collect();
    let beds_col: Vec<u32> = aggregates.keys().map(|k| k.bedrooms as u32).collect();
    let mean_col: Vec<f64> = aggregates.values().map(|a| a.mean).collect();
    let count_col: Vec<u64> = aggregates.values().map(|a| a.count as u64).collect();

    let mut df = DataFrame::new(vec![
        Series::new("geo_unit", geo_col),
        Series::new("level", level_col),
        Series::new("bedrooms", beds_col),
        Series::new("mean_price", mean_col),
        Series::new("count", count_col),
    ])
    .context("Failed to build averages DataFrame")?;

    let file = std::fs::File::create(&path)?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .context("Failed to write averages parquet")?;

    tracing::info!("Wrote {} aggregates to {:?}", aggregates.len(), path);
    Ok(Some(path))
}

/// Write YoY changes to Parquet
pub fn write_yoy_parquet(
    data_dir: &str,
    market: MarketType,
    level: GeoLevel,
    date: &str,
    yoy: &YoyMap,
) -> Result<Option<PathBuf>> {
    if yoy.is_empty() {
        tracing::info!("No YoY changes to write");
        return Ok(None);
    }

    let dir = report_dir(data_dir, market, level, date);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("yoy.parquet");

    let geo_col: Vec<&str> = yoy.keys().map(|k| k.geo_unit.as_str()).collect();
    let level_col: Vec<&str> = yoy.keys().map(|_| level.as_str()).collect();
    let beds_col: Vec<u32> = yoy.keys().map(|k| k.bedrooms as u32).collect();
    let current_col: Vec<f64> = yoy.values().map(|c| c.current_mean).collect();
    let prior_col: Vec<f64> = yoy.values().map(|c| c.prior_mean).collect();
    let change_col: Vec<f64> = yoy.values().map(|c| c.percent_change).collect();

    let mut df = DataFrame::new(vec![
        Series::new("geo_unit", geo_col),
        Series::new("level", level_col),
        Series::new("bedrooms", beds_col),
        Series::new("current_mean", current_col),
        Series::new("prior_mean", prior_col),
        Series::new("percent_change", change_col),
    ])
    .context("Failed to build YoY DataFrame")?;

    let file = std::fs::File::create(&path)?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .context("Failed to write YoY parquet")?;

    tracing::info!("Wrote {} YoY changes to {:?}", yoy.len(), path);
    Ok(Some(path))
}
