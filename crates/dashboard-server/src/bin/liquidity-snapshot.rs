//! liquidity-snapshot: run one liquidity refresh and print it.
//!
//! Usage:
//!   cargo run -p dashboard-server --bin liquidity-snapshot
//!   cargo run -p dashboard-server --bin liquidity-snapshot -- --window 240
//!   cargo run -p dashboard-server --bin liquidity-snapshot -- --window 15 --json
//!
//! Reads the same environment as the dashboard server.

use anyhow::Context;
use dashboard_server::{build_source, format::render_report, DashboardConfig};
use liquidity_core::LookbackWindow;
use liquidity_flow::LiquidityAnalyzer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,liquidity_flow=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: liquidity-snapshot [--window 15|60|240|1440] [--json]");
        return Ok(());
    }
    let json_output = args.iter().any(|a| a == "--json");

    let config = DashboardConfig::from_env()?;
    let window = match args.iter().position(|a| a == "--window") {
        Some(i) => {
            let minutes: u32 = args
                .get(i + 1)
                .context("--window needs a value in minutes")?
                .parse()
                .context("--window must be a number of minutes")?;
            LookbackWindow::try_from(minutes).map_err(anyhow::Error::msg)?
        }
        None => config.window,
    };

    let source = build_source(&config);
    let analyzer = LiquidityAnalyzer::new(source, config.liquidity_config());
    let report = analyzer.refresh(window).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
    }

    Ok(())
}
