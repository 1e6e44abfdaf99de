// =============================================================================
// PriceSeriesSource: the daily-close retrieval capability
// =============================================================================
//
// Any provider that can return daily closes for a ticker within inclusive
// date bounds plugs in here. Failures are narrowed at this boundary into two
// outcomes: the source could not answer (`DataSourceUnavailable`) or it
// answered with nothing (`EmptySeries`).
// =============================================================================

use std::future::Future;

use thiserror::Error;

use crate::date_range::DateRange;
use crate::types::{PriceSeries, Ticker};

/// Provider-side reasons a fetch could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFailure {
    /// Network / transport error before a response was received.
    #[error("request failed: {0}")]
    Request(String),
    /// 401 / 403, usually a missing or invalid API key.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// 404, unknown dataset or endpoint.
    #[error("not found: {0}")]
    NotFound(String),
    /// 429. Not retried.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// 5xx
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// Any other non-success status.
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },
    /// A response arrived but could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Outcome of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("data source unavailable: {0}")]
    DataSourceUnavailable(#[from] SourceFailure),

    #[error("no prices for {ticker} between {range}")]
    EmptySeries { ticker: Ticker, range: DateRange },
}

/// Fetch daily closes for all trading days of `range`, ascending by date.
///
/// Implementations must return `EmptySeries` rather than an empty
/// `PriceSeries`, so a successful result always has at least one point.
pub trait PriceSeriesSource {
    fn fetch(
        &self,
        ticker: &Ticker,
        range: &DateRange,
    ) -> impl Future<Output = Result<PriceSeries, FetchError>> + Send;
}

/// Shared tail of every source: clip to the range and reject empty results.
pub fn finish_series(
    series: PriceSeries,
    ticker: &Ticker,
    range: &DateRange,
) -> Result<PriceSeries, FetchError> {
    let in_range: Vec<_> = series
        .points()
        .iter()
        .copied()
        .filter(|p| range.contains(p.date))
        .collect();

    if in_range.is_empty() {
        return Err(FetchError::EmptySeries {
            ticker: ticker.clone(),
            range: *range,
        });
    }
    Ok(PriceSeries::from_points(in_range))
}
