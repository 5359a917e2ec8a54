//! Write synthetic raw records as JSONL for the jsonl source
//!
//! Usage:
//!   pmx_mockgen --records 5000 --seed 7
//!   pmx_mockgen --config config/pmx.toml --out data/raw

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::io::{BufWriter, Write};
use std::path::Path;

use pmx::config::Config;
use pmx::market::period::PeriodBounds;
use pmx::market::record::MarketType;
use pmx::source::generate_mock_records;

#[derive(Parser)]
#[command(name = "pmx_mockgen")]
#[command(about = "Generate synthetic sale and rent records")]
struct Cli {
    #[arg(long, default_value = "config/pmx.toml")]
    config: String,
    /// Output directory (defaults to source.path)
    #[arg(long)]
    out: Option<String>,
    /// Records per market (defaults to mock.records)
    #[arg(long)]
    records: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    today: Option<NaiveDate>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let out_dir = cli.out.unwrap_or_else(|| config.source.path.clone());
    let count = cli.records.unwrap_or(config.mock.records);
    let seed = cli.seed.unwrap_or(config.mock.seed);
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let bounds = PeriodBounds::resolve_with(today, config.pipeline.lookback_years);

    for market in [MarketType::Sale, MarketType::Rent] {
        let records = generate_mock_records(
            market,
            bounds.lookback(),
            count,
            seed,
            config.mock.invalid_fraction,
        );

        let dir = Path::new(&out_dir).join(format!("market={}", market));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        let path = dir.join("records.jsonl");

        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        for record in &records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        tracing::info!(
            "Wrote {} {} records over {} to {:?}",
            records.len(),
            market,
            bounds.lookback(),
            path
        );
    }

    Ok(())
}
