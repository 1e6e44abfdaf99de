// =============================================================================
// Stock Chart: Main Entry Point
// =============================================================================
//
// Fetches daily closes for a ticker over a date range, derives the 20-day
// mean and Bollinger bands, and writes the result as a PNG chart.
// =============================================================================

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stock_chart::chart::{ChartRenderer, PngChartRenderer, RenderError};
use stock_chart::cli::{describe_failure, Cli, Prompter};
use stock_chart::market_data::{ApiKey, DataLinkClient, PriceSeriesSource};
use stock_chart::pipeline::{build_chart, ChartRequest, PipelineError};
use stock_chart::runtime_config::RuntimeConfig;

/// How a single request ended, for the caller to report.
enum Outcome {
    Rendered(std::path::PathBuf),
    Failed(PipelineError),
    RenderFailed(RenderError),
}

async fn generate<S: PriceSeriesSource, R: ChartRenderer>(
    source: &S,
    renderer: &R,
    request: &ChartRequest,
) -> Outcome {
    let output = match build_chart(source, request).await {
        Ok(output) => output,
        Err(e) => return Outcome::Failed(e),
    };
    match renderer.render(&output.dataset, &output.labels) {
        Ok(path) => Outcome::Rendered(path),
        Err(e) => Outcome::RenderFailed(e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Stock Chart - Closes, 20-day Mean, Bands          ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    // ── 2. Config, provider, renderer ────────────────────────────────────
    if cli.init_config {
        RuntimeConfig::default().save(&cli.config)?;
        println!("Default configuration written to {}", cli.config.display());
        return Ok(());
    }

    let config = RuntimeConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    let api_key = ApiKey::from_env()
        .context("no API key: set NASDAQ_DATA_LINK_API_KEY (or QUANDL_API_KEY)")?;
    let source = DataLinkClient::new(api_key, &config)?;
    let renderer = PngChartRenderer::from_config(&config);

    // ── 3a. One-shot mode ────────────────────────────────────────────────
    if let Some((start, end, ticker)) = cli.one_shot() {
        let request = ChartRequest::parse(start, end, ticker)?;
        return match generate(&source, &renderer, &request).await {
            Outcome::Rendered(path) => {
                println!("Chart saved to {}", path.display());
                Ok(())
            }
            Outcome::Failed(e) => Err(e.into()),
            Outcome::RenderFailed(e) => Err(e.into()),
        };
    }

    // ── 3b. Interactive loop ─────────────────────────────────────────────
    let mut prompter = Prompter::stdio();
    loop {
        let Some(request) = prompter.ask_request()? else {
            break;
        };

        match generate(&source, &renderer, &request).await {
            Outcome::Rendered(path) => {
                prompter.say(&format!("Chart saved to {}", path.display()))?;
            }
            Outcome::Failed(e) => {
                if e.is_empty_series() {
                    warn!(ticker = %request.ticker, range = %request.range, "no prices in range");
                } else {
                    error!(ticker = %request.ticker, error = %e, "chart request failed");
                }
                prompter.say(&describe_failure(&e))?;
            }
            Outcome::RenderFailed(e) => {
                error!(error = %e, "rendering failed");
                prompter.say(&format!("ERROR: could not draw chart: {e}"))?;
            }
        }

        if !prompter.ask_again()? {
            break;
        }
    }

    info!("Stock Chart finished.");
    Ok(())
}
