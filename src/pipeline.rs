// =============================================================================
// Chart pipeline: DateRange → fetch → rolling bands → dataset
// =============================================================================
//
// Every stage returns a typed failure; nothing downstream ever sees a
// half-built value. Input errors are detected before any I/O.
// =============================================================================

use thiserror::Error;
use tracing::{debug, info};

use crate::chart::{ChartDataset, ChartLabels};
use crate::date_range::{DateRange, DateRangeError};
use crate::indicators::bollinger;
use crate::market_data::{FetchError, PriceSeriesSource};
use crate::types::{Ticker, TickerError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidDate(#[from] DateRangeError),

    #[error(transparent)]
    InvalidTicker(#[from] TickerError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl PipelineError {
    /// True when asking the user again can fix the problem.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidDate(_) | Self::InvalidTicker(_))
    }

    /// True for a valid request whose range held no prices.
    pub fn is_empty_series(&self) -> bool {
        matches!(self, Self::Fetch(FetchError::EmptySeries { .. }))
    }
}

/// A validated chart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub range: DateRange,
    pub ticker: Ticker,
}

impl ChartRequest {
    /// Validate raw user input: `M/D/YYYY` start and end, any-case ticker.
    pub fn parse(start: &str, end: &str, ticker: &str) -> Result<Self, PipelineError> {
        let range = DateRange::parse(start, end)?;
        let ticker = Ticker::parse(ticker)?;
        Ok(Self { range, ticker })
    }
}

/// Everything a renderer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOutput {
    pub dataset: ChartDataset,
    pub labels: ChartLabels,
}

/// Fetch the series for `request` and derive the chart dataset from it.
pub async fn build_chart<S: PriceSeriesSource>(
    source: &S,
    request: &ChartRequest,
) -> Result<ChartOutput, PipelineError> {
    info!(
        ticker = %request.ticker,
        range = %request.range,
        calendar_days = request.range.days(),
        "fetching closes"
    );
    let series = source.fetch(&request.ticker, &request.range).await?;

    let rolling = bollinger::compute_default(&series);
    debug!(
        points = series.len(),
        window = rolling.window(),
        band_multiplier = rolling.band_multiplier(),
        first_defined = ?rolling.first_defined(),
        "rolling bands computed"
    );

    let dataset = ChartDataset::assemble(&series, &rolling);
    info!(ticker = %request.ticker, rows = dataset.len(), "chart dataset assembled");

    Ok(ChartOutput {
        dataset,
        labels: ChartLabels::for_ticker(&request.ticker),
    })
}
