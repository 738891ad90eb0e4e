use afford_map::app::presentation::tier_message;
use afford_map::core::summary::{dong_counts, purchasable, trimmed_bounds, RecordFilter};
use afford_map::core::{RecordSource, Storage};
use afford_map::utils::error::{ErrorSeverity, MapError};
use afford_map::utils::{logger, validation::Validate};
use afford_map::{BuyerState, CliConfig, CsvRecordSource, LocalStorage, Record, Tier, TomlConfig};
use anyhow::Context;
use clap::Parser;

/// 初始畫面範圍的單側修剪比例
const BOUNDS_TRIM: f64 = 0.02;
const TOP_AREAS: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting afford-map");
    tracing::debug!("CLI config: {:?}", cli);

    // 驗證參數
    if let Err(e) = cli.validate() {
        tracing::error!("❌ Argument validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli).await {
        let Some(map_error) = e.downcast_ref::<MapError>() else {
            return Err(e);
        };

        tracing::error!(
            "❌ afford-map failed: {:#} (Category: {:?}, Severity: {:?})",
            e,
            map_error.category(),
            map_error.severity()
        );
        eprintln!("❌ {}", map_error.user_friendly_message());
        eprintln!("💡 {}", map_error.recovery_suggestion());

        // 依嚴重程度決定退出碼
        let exit_code = match map_error.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => {
            TomlConfig::from_file(path).with_context(|| format!("loading config {}", path))?
        }
        None => TomlConfig::default(),
    };
    config.validate()?;

    let data_path = cli
        .data
        .as_deref()
        .or(config.data_path())
        .ok_or_else(|| MapError::MissingConfigError {
            field: "data.path".to_string(),
        })?;
    let buyer = cli.buyer(&config)?;

    let storage = LocalStorage::new(".");
    let source = CsvRecordSource::new(storage.clone(), data_path);
    let filter = cli.filter();
    let records: Vec<Record> = source
        .load_records()
        .await
        .with_context(|| format!("loading records from {}", data_path))?
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect();
    tracing::info!("🔎 {} records after filtering", records.len());

    if cli.summary {
        print_summary(&records, &config, &buyer);
        return Ok(());
    }

    let mut aggregator = config.aggregator();
    aggregator.build(records);
    let markers = aggregator.query(&cli.view(), &buyer);
    tracing::info!("📍 {} markers at zoom {}", markers.len(), cli.zoom);

    let json = serde_json::to_vec_pretty(&markers).map_err(MapError::from)?;
    match &cli.output {
        Some(path) => {
            storage.write_file(path, &json).await?;
            tracing::info!("📁 Markers saved to: {}", path);
        }
        None => println!("{}", String::from_utf8_lossy(&json)),
    }

    Ok(())
}

fn print_summary(records: &[Record], config: &TomlConfig, buyer: &BuyerState) {
    let model = config.model();
    let palette = &config.presentation;
    let listing = purchasable(records, &model, buyer, &RecordFilter::default());
    let loan_dependent = listing.iter().filter(|p| p.is_loan_dependent).count();

    println!(
        "📊 {} records, {} affordable ({} only with the loan)",
        records.len(),
        listing.len(),
        loan_dependent
    );
    for tier in [Tier::Ample, Tier::Comfortable, Tier::Tight] {
        let count = listing.iter().filter(|p| p.result.tier == tier).count();
        println!(
            "  {:<12} {:>6}  {}  {}",
            tier.name(),
            count,
            palette.color(tier).unwrap_or("-"),
            tier_message(tier)
        );
    }

    if let Some(cheapest) = listing
        .iter()
        .min_by(|a, b| a.record.price.total_cmp(&b.record.price))
    {
        if let Ok(split) = model.breakdown(cheapest.record.price, cheapest.record.known_area(), buyer) {
            println!(
                "💰 Cheapest: {} {} at {} (cash {}, loan {})",
                cheapest.record.dong,
                cheapest.record.apt.as_deref().unwrap_or(""),
                palette.price_label(cheapest.record.price),
                palette.price_label(split.cash_used),
                palette.price_label(split.loan_used)
            );
        }
    }

    let mut areas: Vec<(String, usize)> = dong_counts(listing.iter().map(|p| p.record))
        .into_iter()
        .collect();
    areas.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if !areas.is_empty() {
        println!("🏘️ Affordable deals by area:");
        for (dong, count) in areas.into_iter().take(TOP_AREAS) {
            println!("  {:<20} {:>6}", dong, count);
        }
    }

    if let Some(bounds) = trimmed_bounds(records, BOUNDS_TRIM) {
        println!(
            "🗺️ Data bounds: {:.4},{:.4},{:.4},{:.4}",
            bounds.west, bounds.south, bounds.east, bounds.north
        );
    }
}
