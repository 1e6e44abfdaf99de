//! Date-indexed table of the four series handed to a renderer.

use chrono::NaiveDate;

use crate::indicators::bollinger::RollingWindowResult;
use crate::types::{PriceSeries, Ticker};

/// Y-axis label shown on every chart.
pub const Y_AXIS_LABEL: &str = "Price per Share";

/// One row per trading day. Undefined rolling values are `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartRow {
    pub date: NaiveDate,
    pub close: f64,
    pub moving_average: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
}

/// Selects one column of a [`ChartDataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Close,
    MovingAverage,
    UpperBand,
    LowerBand,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Close,
        Column::MovingAverage,
        Column::UpperBand,
        Column::LowerBand,
    ];

    /// Legend label.
    pub fn label(self) -> &'static str {
        match self {
            Column::Close => "close",
            Column::MovingAverage => "close: 20 day mean",
            Column::UpperBand => "upper",
            Column::LowerBand => "lower",
        }
    }

    fn value(self, row: &ChartRow) -> Option<f64> {
        match self {
            Column::Close => Some(row.close),
            Column::MovingAverage => row.moving_average,
            Column::UpperBand => row.upper_band,
            Column::LowerBand => row.lower_band,
        }
    }
}

/// Presentation metadata that travels alongside the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartLabels {
    pub title: String,
    pub y_axis: &'static str,
}

impl ChartLabels {
    pub fn for_ticker(ticker: &Ticker) -> Self {
        Self {
            title: ticker.to_string(),
            y_axis: Y_AXIS_LABEL,
        }
    }
}

/// Close, moving average, upper band and lower band aligned by date,
/// ascending. Read-only once assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartDataset {
    rows: Vec<ChartRow>,
}

impl ChartDataset {
    /// Zip a series with the rolling result computed from it.
    ///
    /// # Panics
    /// If `rolling` was not derived from `series` (length mismatch).
    pub fn assemble(series: &PriceSeries, rolling: &RollingWindowResult) -> Self {
        assert_eq!(
            series.len(),
            rolling.len(),
            "rolling result must be computed from the same series"
        );

        let rows = series
            .points()
            .iter()
            .zip(rolling.entries())
            .map(|(point, band)| ChartRow {
                date: point.date,
                close: point.close,
                moving_average: band.map(|b| b.moving_average),
                upper_band: band.map(|b| b.upper),
                lower_band: band.map(|b| b.lower),
            })
            .collect();

        Self { rows }
    }

    pub fn rows(&self) -> &[ChartRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn column(&self, column: Column) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| column.value(r)).collect()
    }

    /// Runs of consecutive defined values in `column`. A line is drawn per
    /// run so that undefined rows leave a gap instead of a zero.
    pub fn segments(&self, column: Column) -> Vec<Vec<(NaiveDate, f64)>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for row in &self.rows {
            match column.value(row) {
                Some(v) => current.push((row.date, v)),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }

    /// `(min, max)` across every defined value of every column.
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.rows
            .iter()
            .flat_map(|r| Column::ALL.into_iter().filter_map(move |c| c.value(r)))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::bollinger::{compute, compute_default};
    use crate::types::PricePoint;
    use chrono::Duration;

    fn series_of(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2014, 1, 1).unwrap();
        PriceSeries::from_points(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| PricePoint::new(start + Duration::days(i as i64), c))
                .collect(),
        )
    }

    #[test]
    fn rows_align_with_series() {
        let closes: Vec<f64> = (100..125).map(|x| x as f64).collect();
        let series = series_of(&closes);
        let rolling = compute_default(&series);
        let ds = ChartDataset::assemble(&series, &rolling);

        assert_eq!(ds.len(), 25);
        assert_eq!(ds.first_date(), series.first().map(|p| p.date));
        assert_eq!(ds.last_date(), series.last().map(|p| p.date));
        for (row, point) in ds.rows().iter().zip(series.points()) {
            assert_eq!(row.date, point.date);
            assert_eq!(row.close, point.close);
        }
        assert!(ds.rows()[18].moving_average.is_none());
        assert!(ds.rows()[18].upper_band.is_none());
        assert!((ds.rows()[19].moving_average.unwrap() - 109.5).abs() < 1e-10);
    }

    #[test]
    fn undefined_values_kept_as_none() {
        let series = series_of(&[5.0; 10]);
        let ds = ChartDataset::assemble(&series, &compute_default(&series));
        assert_eq!(ds.len(), 10);
        assert!(ds.column(Column::MovingAverage).iter().all(Option::is_none));
        assert!(ds.column(Column::LowerBand).iter().all(Option::is_none));
        assert!(ds.column(Column::Close).iter().all(|v| *v == Some(5.0)));
        assert!(ds.segments(Column::UpperBand).is_empty());
    }

    #[test]
    #[should_panic(expected = "same series")]
    fn mismatched_lengths_panic() {
        let a = series_of(&[1.0; 25]);
        let b = series_of(&[1.0; 24]);
        let _ = ChartDataset::assemble(&a, &compute_default(&b));
    }

    #[test]
    fn segments_start_once_defined() {
        let closes: Vec<f64> = (0..22).map(|x| x as f64).collect();
        let series = series_of(&closes);
        let ds = ChartDataset::assemble(&series, &compute_default(&series));

        let close = ds.segments(Column::Close);
        assert_eq!(close.len(), 1);
        assert_eq!(close[0].len(), 22);

        let ma = ds.segments(Column::MovingAverage);
        assert_eq!(ma.len(), 1);
        assert_eq!(ma[0].len(), 3);
        assert_eq!(ma[0][0].0, ds.rows()[19].date);
    }

    #[test]
    fn value_bounds_cover_bands() {
        let closes: Vec<f64> = (0..20).map(|x| x as f64).collect();
        let series = series_of(&closes);
        let ds = ChartDataset::assemble(&series, &compute(&series, 20, 2.0));
        let (lo, hi) = ds.value_bounds().unwrap();
        let last = ds.rows()[19];
        assert_eq!(lo, last.lower_band.unwrap().min(0.0));
        assert_eq!(hi, last.upper_band.unwrap().max(19.0));
        assert!(lo < 0.0 && hi > 19.0);
    }

    #[test]
    fn empty_dataset_has_no_bounds() {
        let series = PriceSeries::default();
        let ds = ChartDataset::assemble(&series, &compute_default(&series));
        assert!(ds.is_empty());
        assert!(ds.value_bounds().is_none());
        assert!(ds.first_date().is_none());
    }

    #[test]
    fn labels_use_ticker_and_fixed_axis() {
        let labels = ChartLabels::for_ticker(&Ticker::parse("aapl").unwrap());
        assert_eq!(labels.title, "AAPL");
        assert_eq!(labels.y_axis, "Price per Share");
    }
}
