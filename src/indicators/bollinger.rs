// =============================================================================
// Rolling Bollinger Bands
// =============================================================================
//
// For every point of a close series, over the trailing `window` closes:
//   middle = SMA
//   upper  = SMA + k * σ
//   lower  = SMA - k * σ
//
// σ is the SAMPLE standard deviation (n − 1 divisor). Entries with fewer than
// `window` closes of history (index i with i + 1 < window) are undefined:
// there are no partial-window averages and no forward fill.
// =============================================================================

use crate::types::PriceSeries;

/// Trailing window length in trading days.
pub const DEFAULT_WINDOW: usize = 20;

/// Number of standard deviations between the moving average and each band.
pub const DEFAULT_BAND_MULTIPLIER: f64 = 2.0;

/// Moving average and band values for one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPoint {
    pub moving_average: f64,
    pub upper: f64,
    pub lower: f64,
}

impl BandPoint {
    /// Distance between the bands.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// One optional [`BandPoint`] per point of the source series, same order.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindowResult {
    window: usize,
    band_multiplier: f64,
    entries: Vec<Option<BandPoint>>,
}

impl RollingWindowResult {
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn band_multiplier(&self) -> f64 {
        self.band_multiplier
    }

    pub fn entries(&self) -> &[Option<BandPoint>] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<BandPoint> {
        self.entries.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first defined entry, `None` when the series never filled a
    /// whole window.
    pub fn first_defined(&self) -> Option<usize> {
        self.entries.iter().position(Option::is_some)
    }
}

/// Compute rolling bands with the standard 20-day / 2σ parameters.
pub fn compute_default(series: &PriceSeries) -> RollingWindowResult {
    compute(series, DEFAULT_WINDOW, DEFAULT_BAND_MULTIPLIER)
}

/// Compute the rolling moving average and bands for every point of `series`.
///
/// A series shorter than `window` is not an error: every entry is `None`.
/// `window < 2` also yields all `None`, since the sample deviation of a
/// single value is undefined.
pub fn compute(series: &PriceSeries, window: usize, band_multiplier: f64) -> RollingWindowResult {
    let closes = series.closes();

    let entries = if window < 2 {
        vec![None; closes.len()]
    } else {
        (0..closes.len())
            .map(|i| {
                if i + 1 < window {
                    return None;
                }
                let slice = &closes[i + 1 - window..=i];
                Some(band_point(slice, band_multiplier))
            })
            .collect()
    };

    RollingWindowResult {
        window,
        band_multiplier,
        entries,
    }
}

/// Two-pass mean and sample deviation over a full window (`len >= 2`).
fn band_point(window: &[f64], band_multiplier: f64) -> BandPoint {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    BandPoint {
        moving_average: mean,
        upper: mean + band_multiplier * std_dev,
        lower: mean - band_multiplier * std_dev,
    }
}
