//! Property market aggregation CLI
//!
//! Usage:
//!   pmx_report periods --today 2024-02-15
//!   pmx_report all --market sale --level county --version yoy
//!   pmx_report average --county Cork --beds 2,3
//!   pmx_report yoy --county Dublin
//!   pmx_report rent --version average
//!   pmx_report properties --area Douglas
//!   pmx_report export --market rent --level region

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::Path;

use pmx::config::Config;
use pmx::market::outputs::{write_aggregates_parquet, write_shaped_json, write_yoy_parquet};
use pmx::market::record::{GeoLevel, MarketType};
use pmx::market::shape::{parse_beds_filter, shape_averages, shape_yoy};
use pmx::service::{MarketService, Version};

#[derive(Parser)]
#[command(name = "pmx_report")]
#[command(about = "Property price averages and year-over-year changes")]
struct Cli {
    #[arg(long, default_value = "config/pmx.toml")]
    config: String,
    /// Pin "today" (YYYY-MM-DD) instead of using the clock
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved lookback, current and prior windows
    Periods,
    /// Shaped output for every geo-unit
    All {
        #[arg(long, value_enum, default_value = "sale")]
        market: MarketType,
        #[arg(long, value_enum, default_value = "county")]
        level: GeoLevel,
        #[arg(long, value_enum, default_value = "average")]
        version: Version,
    },
    /// Sale averages for one county
    Average {
        #[arg(long)]
        county: String,
        /// Comma-separated bedroom buckets, e.g. "2,3"
        #[arg(long, default_value = "")]
        beds: String,
    },
    /// Sale YoY changes for one county
    Yoy {
        #[arg(long)]
        county: String,
        #[arg(long, default_value = "")]
        beds: String,
    },
    /// Rent figures per county
    Rent {
        #[arg(long, value_enum, default_value = "average")]
        version: Version,
    },
    /// Sale records in a county, region or area ("All" for every record)
    Properties {
        #[arg(long, default_value = "All")]
        area: String,
    },
    /// Write averages and YoY changes to JSON and Parquet under data_dir
    Export {
        #[arg(long, value_enum, default_value = "sale")]
        market: MarketType,
        #[arg(long, value_enum, default_value = "county")]
        level: GeoLevel,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_beds(beds: &str) -> Result<Vec<u8>> {
    parse_beds_filter(beds).with_context(|| format!("Invalid bedroom filter: {:?}", beds))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let mut service = MarketService::from_config(&config)?;
    if let Some(today) = cli.today {
        service = service.with_today(today);
    }

    match cli.command {
        Commands::Periods => {
            let bounds = service.periods();
            tracing::info!(
                "lookback {}, current {}, prior {}",
                bounds.lookback(),
                bounds.current(),
                bounds.prior()
            );
            print_json(&bounds)?;
        }
        Commands::All { market, level, version } => {
            print_json(&service.all(market, level, version).await?)?;
        }
        Commands::Average { county, beds } => {
            let beds = parse_beds(&beds)?;
            print_json(&service.average(&county, &beds).await?)?;
        }
        Commands::Yoy { county, beds } => {
            let beds = parse_beds(&beds)?;
            print_json(&service.yoy(&county, &beds).await?)?;
        }
        Commands::Rent { version } => {
            print_json(&service.rent(version).await?)?;
        }
        Commands::Properties { area } => {
            print_json(&service.properties(&area).await?)?;
        }
        Commands::Export { market, level } => {
            let report = service.report(market, level).await?;
            let date = service.today().format("%Y-%m-%d").to_string();

            write_aggregates_parquet(&config.data_dir, market, level, &date, &report.averages)?;
            write_yoy_parquet(&config.data_dir, market, level, &date, &report.yoy)?;

            let dir = Path::new(&config.data_dir)
                .join("reports")
                .join(format!("market={}", market))
                .join(format!("level={}", level))
                .join(format!("date={}", date));
            write_shaped_json(dir.join("averages.json"), &shape_averages(&report.averages, level)?)?;
            write_shaped_json(dir.join("yoy.json"), &shape_yoy(&report.yoy, level))?;

            tracing::info!(
                "Exported {} averages and {} YoY changes for {} at {} level",
                report.averages.len(),
                report.yoy.len(),
                market,
                level
            );
        }
    }

    Ok(())
}
